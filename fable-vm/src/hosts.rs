// fable-vm - Host callback surface
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The callback surface an embedder provides.
//!
//! Text and choice presentation have no useful default and error if
//! invoked unset. Variable and flag storage default to in-memory maps
//! owned by the interpreter instance. Chance resolution defaults to fair
//! random draws. External functions are looked up by name; a call to an
//! unregistered name goes through a fallback that errors by default.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::{Result, RuntimeError};
use crate::random;
use crate::value::Value;

/// Receives each line of text as the script runs it.
pub type TextCallback = Box<dyn FnMut(String)>;

/// Receives the candidate texts when a choice suspends the scene.
pub type ChoiceCallback = Box<dyn FnMut(Vec<String>)>;

/// Resolves a global variable read.
pub type VariableGetCallback = Box<dyn FnMut(&str) -> Value>;

/// Stores a global variable write.
pub type VariableSetCallback = Box<dyn FnMut(&str, Value)>;

/// Resolves a flag read.
pub type FlagGetCallback = Box<dyn FnMut(&str) -> Value>;

/// Stores a flag write.
pub type FlagSetCallback = Box<dyn FnMut(&str, Value)>;

/// Notified with the scene name when a scene ends.
pub type EndSceneCallback = Box<dyn FnMut(&str)>;

/// Decides whether a candidate with the given chance appears.
pub type ChanceCallback = Box<dyn FnMut(f64) -> bool>;

/// Picks an index from a list of non-negative weights.
pub type WeightedChanceCallback = Box<dyn FnMut(&[f64]) -> usize>;

/// Invoked when a script calls an external function with no registered
/// handler; returning `Ok` lets the call produce Undefined.
pub type UnregisteredFunctionCallback = Box<dyn FnMut(&str) -> Result<()>>;

/// A host function callable from scripts by name.
pub type ExternalFunction = Box<dyn FnMut(&[Value]) -> Result<Value>>;

/// All host callback slots, with their defaults.
pub(crate) struct HostHooks {
    pub text: Option<TextCallback>,
    pub choice: Option<ChoiceCallback>,
    pub variable_get: VariableGetCallback,
    pub variable_set: VariableSetCallback,
    pub flag_get: FlagGetCallback,
    pub flag_set: FlagSetCallback,
    pub end_scene: EndSceneCallback,
    pub chance: ChanceCallback,
    pub weighted_chance: WeightedChanceCallback,
    pub unregistered_function: UnregisteredFunctionCallback,
    pub functions: HashMap<String, ExternalFunction>,
}

impl HostHooks {
    pub fn new() -> Self {
        let (variable_get, variable_set) = in_memory_store();
        let (flag_get, flag_set) = in_memory_store();

        let mut functions: HashMap<String, ExternalFunction> = HashMap::new();
        functions.insert("char".to_string(), Box::new(|_args| Ok(Value::Undefined)));

        Self {
            text: None,
            choice: None,
            variable_get,
            variable_set,
            flag_get,
            flag_set,
            end_scene: Box::new(|_name| {}),
            chance: Box::new(default_chance),
            weighted_chance: Box::new(default_weighted_chance),
            unregistered_function: Box::new(|name| {
                Err(RuntimeError::UnknownFunction(name.to_string()))
            }),
            functions,
        }
    }

    /// Run the text callback, or fail if none was registered.
    pub fn run_text(&mut self, text: String) -> Result<()> {
        match self.text.as_mut() {
            Some(callback) => {
                callback(text);
                Ok(())
            }
            None => Err(RuntimeError::HostMissing("text")),
        }
    }

    /// Run the choice callback, or fail if none was registered.
    pub fn run_choice(&mut self, choices: Vec<String>) -> Result<()> {
        match self.choice.as_mut() {
            Some(callback) => {
                callback(choices);
                Ok(())
            }
            None => Err(RuntimeError::HostMissing("choice")),
        }
    }
}

/// A get/set callback pair over one shared in-memory map. Reads of unset
/// names yield Undefined.
fn in_memory_store() -> (Box<dyn FnMut(&str) -> Value>, Box<dyn FnMut(&str, Value)>) {
    let store: Rc<RefCell<HashMap<String, Value>>> = Rc::new(RefCell::new(HashMap::new()));
    let read_store = Rc::clone(&store);
    let get = Box::new(move |name: &str| {
        read_store
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or(Value::Undefined)
    });
    let set = Box::new(move |name: &str, value: Value| {
        store.borrow_mut().insert(name.to_string(), value);
    });
    (get, set)
}

/// A chance of exactly 1.0 always fires; otherwise draw uniformly.
fn default_chance(chance: f64) -> bool {
    chance == 1.0 || random::random_real(0.0, 1.0) < chance
}

/// Cumulative-weight pick over non-negative weights. Weights that do not
/// contribute (zero or negative) are never picked unless nothing else can
/// be.
fn default_weighted_chance(weights: &[f64]) -> usize {
    let total: f64 = weights.iter().copied().filter(|w| *w > 0.0).sum();
    if total <= 0.0 {
        return 0;
    }

    let draw = random::random_real(0.0, total);
    let mut accumulated = 0.0;
    for (i, weight) in weights.iter().enumerate() {
        if *weight <= 0.0 {
            continue;
        }
        accumulated += weight;
        if draw < accumulated {
            return i;
        }
    }
    weights.len().saturating_sub(1)
}
