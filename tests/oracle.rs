//! Applies random sequences of operations to each lock-free stack and to a
//! single-lock reference stack, and checks that they behave identically.
#![cfg(not(loom))]
use lockfree_stack::{ArrayStack, NodeStack, Stack};
use proptest::{collection::vec, prelude::*};
use std::collections::HashMap;

mod support;
use support::LockedStack;

#[derive(Debug, Clone)]
enum Op {
    Push(String),
    Pop,
    Top,
}

/// The observable outcome of a single operation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Outcome {
    value: Option<String>,
    ok: bool,
    len: usize,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => "[a-z]{0,3}".prop_map(Op::Push),
        2 => Just(Op::Pop),
        1 => Just(Op::Top),
    ]
}

fn apply(stack: &dyn Stack<String>, ops: &[Op]) -> (Vec<Outcome>, HashMap<String, usize>) {
    let outcomes = ops
        .iter()
        .map(|op| {
            let (value, ok) = match op {
                Op::Push(value) => match stack.push(value.clone()) {
                    Ok(()) => (Some(value.clone()), true),
                    Err(rejected) => (Some(rejected), false),
                },
                Op::Pop => {
                    let value = stack.pop();
                    let ok = value.is_some();
                    (value, ok)
                }
                Op::Top => {
                    let value = stack.top();
                    let ok = value.is_some();
                    (value, ok)
                }
            };
            Outcome {
                value,
                ok,
                len: stack.len(),
            }
        })
        .collect();

    let mut retained = HashMap::new();
    while stack.len() > 0 {
        let value = stack.pop().expect("a non-empty stack must pop");
        *retained.entry(value).or_insert(0) += 1;
    }
    (outcomes, retained)
}

proptest! {
    #[test]
    fn node_stack_matches_oracle(ops in vec(op(), 0..512)) {
        let expected = apply(&LockedStack::new(), &ops);
        let actual = apply(&NodeStack::new(), &ops);
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn array_stack_matches_oracle(ops in vec(op(), 0..512)) {
        // large enough that it never fills up
        let expected = apply(&LockedStack::new(), &ops);
        let actual = apply(&ArrayStack::with_capacity(512), &ops);
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn small_array_stack_matches_bounded_oracle(
        capacity in 1usize..8,
        ops in vec(op(), 0..256),
    ) {
        let expected = apply(&LockedStack::bounded(capacity), &ops);
        let actual = apply(&ArrayStack::with_capacity(capacity), &ops);
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn sequential_conservation(ops in vec(op(), 0..512)) {
        let stack = NodeStack::new();
        let mut pushes = 0usize;
        let mut pops = 0usize;
        for op in &ops {
            match op {
                Op::Push(value) => {
                    if stack.push(value.clone()).is_ok() {
                        pushes += 1;
                    }
                }
                Op::Pop => {
                    if stack.pop().is_some() {
                        pops += 1;
                    }
                }
                Op::Top => {
                    let _ = stack.top();
                }
            }
            prop_assert_eq!(pushes - pops, stack.len());
            prop_assert_eq!(stack.is_empty(), stack.len() == 0);
        }
    }
}
