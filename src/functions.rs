//! The predefined function pairs executed by `splitcalc-worker`.
//!
//! Every native tag owns a table of cases. A case describes what `f(index)` and `g(index)` return
//! and how long each takes. Some cases never return on one side; those are always paired with a
//! short-circuiting value on the other side, so every request in the domain completes.

use std::thread;
use std::time::Duration;

use crate::operation::{Function, NativeTag, Value};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    Ready { value: Value, after: Duration },
    Hang,
}

#[derive(Debug, Clone, Copy)]
pub struct Case {
    pub f: Outcome,
    pub g: Outcome,
}

impl Case {
    pub fn outcome(&self, function: Function) -> Outcome {
        match function {
            Function::F => self.f,
            Function::G => self.g,
        }
    }
}

const fn ready(value: Value, millis: u64) -> Outcome {
    Outcome::Ready {
        value,
        after: Duration::from_millis(millis),
    }
}

const fn boolean(b: bool, millis: u64) -> Outcome {
    ready(Value::Bool(b), millis)
}

const fn int(i: i64, millis: u64) -> Outcome {
    ready(Value::Int(i), millis)
}

#[rustfmt::skip]
const OR_CASES: [Case; 6] = [
    Case { f: boolean(true, 0), g: boolean(false, 0) },
    Case { f: boolean(false, 200), g: boolean(true, 1_000) },
    Case { f: boolean(false, 100), g: boolean(false, 300) },
    Case { f: boolean(true, 500), g: Outcome::Hang },
    Case { f: Outcome::Hang, g: boolean(true, 300) },
    Case { f: boolean(true, 2_000), g: boolean(false, 1_000) },
];

#[rustfmt::skip]
const AND_CASES: [Case; 6] = [
    Case { f: boolean(true, 0), g: boolean(true, 0) },
    Case { f: boolean(true, 200), g: boolean(false, 1_000) },
    Case { f: boolean(true, 100), g: boolean(true, 300) },
    Case { f: boolean(false, 500), g: Outcome::Hang },
    Case { f: Outcome::Hang, g: boolean(false, 300) },
    Case { f: boolean(false, 2_000), g: boolean(true, 1_000) },
];

#[rustfmt::skip]
const INT_CASES: [Case; 6] = [
    Case { f: int(2, 0), g: int(3, 0) },
    Case { f: int(0, 100), g: Outcome::Hang },
    Case { f: Outcome::Hang, g: int(0, 200) },
    Case { f: int(-7, 50), g: int(6, 300) },
    Case { f: int(12, 1_000), g: int(12, 1_000) },
    Case { f: int(1_000_000, 0), g: int(-3, 400) },
];

fn cases(tag: NativeTag) -> &'static [Case] {
    match tag {
        NativeTag::Or => &OR_CASES,
        NativeTag::And => &AND_CASES,
        NativeTag::Int => &INT_CASES,
    }
}

pub fn domain_size(tag: NativeTag) -> usize {
    cases(tag).len()
}

pub fn case(tag: NativeTag, index: usize) -> Option<&'static Case> {
    cases(tag).get(index)
}

/// Runs `function` of the pair selected by `tag` on `index`, blocking the calling thread for as
/// long as the case takes. Returns `None` when `index` is outside the table.
pub fn evaluate(tag: NativeTag, function: Function, index: usize) -> Option<Value> {
    match case(tag, index)?.outcome(function) {
        Outcome::Ready { value, after } => {
            thread::sleep(after);
            Some(value)
        }
        Outcome::Hang => loop {
            thread::park();
        },
    }
}
