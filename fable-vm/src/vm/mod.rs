// fable-vm - The interpreter
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The scene interpreter: a stack-based VM over a loaded image.
//!
//! One interpreter runs one scene at a time, single-threaded. The dispatch
//! loop runs until the script suspends: a text run waits for
//! [`Interpreter::resume_scene`], a choice waits for
//! [`Interpreter::select_choice`], and [`Interpreter::pause_scene`] parks a
//! running scene. Host callbacks fire synchronously at the opcode that
//! invokes them.
//!
//! # Thread Safety
//!
//! **`Interpreter` is NOT thread-safe.** It shares the image through `Rc`
//! and `RefCell`. Create one interpreter per thread, each with its own
//! image handle, if you need concurrency.

mod dispatch;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use fable_image::Image;
use tracing::debug;

use crate::definitions::DefinitionInstance;
use crate::error::{Result, RuntimeError};
use crate::frame::CallFrame;
use crate::hosts::{
    ChanceCallback, ChoiceCallback, EndSceneCallback, FlagGetCallback, FlagSetCallback, HostHooks,
    TextCallback, UnregisteredFunctionCallback, VariableGetCallback, VariableSetCallback,
    WeightedChanceCallback,
};
use crate::stack::ValueStack;
use crate::value::Value;

/// Execution state of an interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No scene is active.
    Inactive,
    /// The dispatch loop is executing opcodes.
    Running,
    /// A running scene was parked by the host.
    Paused,
    /// Suspended at a text run; resume to continue.
    InText,
    /// Suspended at a choice; select to continue.
    InChoice,
    /// Executing a standalone expression.
    Eval,
}

impl State {
    /// Name of this state, for error messages.
    pub fn name(self) -> &'static str {
        match self {
            State::Inactive => "Inactive",
            State::Running => "Running",
            State::Paused => "Paused",
            State::InText => "InText",
            State::InChoice => "InChoice",
            State::Eval => "Eval",
        }
    }
}

/// A candidate branch collected for an interactive choice.
#[derive(Debug, Clone)]
pub(crate) struct ChoiceEntry {
    pub target_offset: i32,
    pub text: String,
}

/// A candidate branch collected for a weighted choose.
#[derive(Debug, Clone)]
pub(crate) struct ChooseEntry {
    pub target_offset: i32,
    pub chance: f64,
}

/// The scene interpreter.
pub struct Interpreter {
    pub(crate) image: Rc<RefCell<Image>>,
    pub(crate) hooks: HostHooks,

    pub(crate) state: State,
    pub(crate) program_counter: i32,
    pub(crate) stack: ValueStack,
    pub(crate) call_stack: Vec<CallFrame>,
    pub(crate) locals: Vec<Value>,
    pub(crate) choice_options: Vec<ChoiceEntry>,
    pub(crate) choose_options: Vec<ChooseEntry>,
    pub(crate) save_register: Option<Value>,
    pub(crate) flag_count: usize,
    pub(crate) current_scene: Option<String>,
    pub(crate) starting_choice: bool,
    pub(crate) flags_initialized: bool,
    pub(crate) definitions: HashMap<String, DefinitionInstance>,
}

impl Interpreter {
    /// Create an interpreter owning a freshly loaded image.
    pub fn new(image: Image) -> Self {
        Self::from_shared(Rc::new(RefCell::new(image)))
    }

    /// Create an interpreter over a shared image handle. The image may be
    /// shared across interpreter instances; VM state is per instance.
    pub fn from_shared(image: Rc<RefCell<Image>>) -> Self {
        Self {
            image,
            hooks: HostHooks::new(),
            state: State::Inactive,
            program_counter: -1,
            stack: ValueStack::new(),
            call_stack: Vec::new(),
            locals: Vec::new(),
            choice_options: Vec::new(),
            choose_options: Vec::new(),
            save_register: None,
            flag_count: 0,
            current_scene: None,
            starting_choice: false,
            flags_initialized: false,
            definitions: HashMap::new(),
        }
    }

    /// A handle to the image this interpreter runs.
    pub fn image(&self) -> Rc<RefCell<Image>> {
        Rc::clone(&self.image)
    }

    /// Current execution state.
    pub fn state(&self) -> State {
        self.state
    }

    /// Name of the scene currently active, if any.
    pub fn current_scene(&self) -> Option<&str> {
        self.current_scene.as_deref()
    }

    // =========================================================================
    // Host configuration
    // =========================================================================

    /// Set the text callback. Required before any scene that runs text.
    pub fn text_handler(&mut self, f: impl FnMut(String) + 'static) -> &mut Self {
        self.hooks.text = Some(Box::new(f) as TextCallback);
        self
    }

    /// Set the choice callback. Required before any scene that presents
    /// choices.
    pub fn choice_handler(&mut self, f: impl FnMut(Vec<String>) + 'static) -> &mut Self {
        self.hooks.choice = Some(Box::new(f) as ChoiceCallback);
        self
    }

    /// Replace the global-variable read callback.
    pub fn variable_get_handler(&mut self, f: impl FnMut(&str) -> Value + 'static) -> &mut Self {
        self.hooks.variable_get = Box::new(f) as VariableGetCallback;
        self
    }

    /// Replace the global-variable write callback.
    pub fn variable_set_handler(&mut self, f: impl FnMut(&str, Value) + 'static) -> &mut Self {
        self.hooks.variable_set = Box::new(f) as VariableSetCallback;
        self
    }

    /// Replace the flag read callback.
    pub fn flag_get_handler(&mut self, f: impl FnMut(&str) -> Value + 'static) -> &mut Self {
        self.hooks.flag_get = Box::new(f) as FlagGetCallback;
        self
    }

    /// Replace the flag write callback.
    pub fn flag_set_handler(&mut self, f: impl FnMut(&str, Value) + 'static) -> &mut Self {
        self.hooks.flag_set = Box::new(f) as FlagSetCallback;
        self
    }

    /// Replace the end-of-scene callback.
    pub fn end_scene_handler(&mut self, f: impl FnMut(&str) + 'static) -> &mut Self {
        self.hooks.end_scene = Box::new(f) as EndSceneCallback;
        self
    }

    /// Replace the chance callback deciding whether candidates appear.
    pub fn chance_handler(&mut self, f: impl FnMut(f64) -> bool + 'static) -> &mut Self {
        self.hooks.chance = Box::new(f) as ChanceCallback;
        self
    }

    /// Replace the weighted-chance callback picking a choose branch.
    pub fn weighted_chance_handler(
        &mut self,
        f: impl FnMut(&[f64]) -> usize + 'static,
    ) -> &mut Self {
        self.hooks.weighted_chance = Box::new(f) as WeightedChanceCallback;
        self
    }

    /// Replace the fallback for calls to unregistered external functions.
    pub fn unregistered_function_handler(
        &mut self,
        f: impl FnMut(&str) -> Result<()> + 'static,
    ) -> &mut Self {
        self.hooks.unregistered_function = Box::new(f) as UnregisteredFunctionCallback;
        self
    }

    /// Register an external function callable from scripts by name.
    /// Re-registering a name replaces the previous handler.
    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        f: impl FnMut(&[Value]) -> Result<Value> + 'static,
    ) -> &mut Self {
        self.hooks.functions.insert(name.into(), Box::new(f));
        self
    }

    // =========================================================================
    // Scene lifecycle
    // =========================================================================

    /// Start the named scene and run until it suspends or ends.
    ///
    /// A scene with no body returns immediately without entering the
    /// dispatch loop.
    pub fn run_scene(&mut self, name: &str) -> Result<()> {
        let (code_offset, flag_names) = {
            let img = self.image.borrow();
            let scene = img
                .scene(name)
                .ok_or_else(|| RuntimeError::UnknownScene(name.to_string()))?;
            (scene.code_offset, scene.flag_names.clone())
        };

        self.current_scene = Some(name.to_string());
        self.program_counter = code_offset;
        if code_offset == -1 {
            return Ok(());
        }

        self.state = State::Running;
        self.clear_vm_state();

        // Load flag-backed locals ahead of any script-declared ones.
        for flag_name in &flag_names {
            let value = (self.hooks.flag_get)(flag_name);
            self.locals.push(value);
        }
        self.flag_count = flag_names.len();

        debug!(scene = name, offset = code_offset, "scene started");
        self.dispatch_while(State::Running)
    }

    /// Park a running scene until the next resume.
    pub fn pause_scene(&mut self) {
        if self.state == State::Running {
            self.state = State::Paused;
        }
    }

    /// Continue a scene suspended at a text run or paused by the host.
    pub fn resume_scene(&mut self) -> Result<()> {
        if self.state == State::Paused || self.state == State::InText {
            self.state = State::Running;
        }
        self.dispatch_while(State::Running)
    }

    /// End the active scene: reset to Inactive, clear all VM state, and
    /// notify the end-scene callback. May be called from any state.
    pub fn end_scene(&mut self) {
        self.state = State::Inactive;
        let name = self.current_scene.take();
        self.clear_vm_state();
        if let Some(name) = name {
            debug!(scene = %name, "scene ended");
            (self.hooks.end_scene)(&name);
        }
    }

    /// Pick a pending choice by index and run until the scene suspends
    /// again or ends.
    pub fn select_choice(&mut self, index: usize) -> Result<()> {
        self.require_state(State::InChoice)?;

        let target = self
            .choice_options
            .get(index)
            .map(|entry| entry.target_offset)
            .ok_or(RuntimeError::BadSelection {
                index,
                len: self.choice_options.len(),
            })?;

        debug!(index, target, "choice selected");
        self.program_counter = target;
        self.choice_options.clear();

        self.state = State::Running;
        self.dispatch_while(State::Running)
    }

    // =========================================================================
    // Standalone evaluation
    // =========================================================================

    /// Evaluate an expression at `address` and return its single result.
    /// Only legal while no scene is active.
    pub fn execute_eval(&mut self, address: i32) -> Result<Value> {
        self.execute_eval_multiple(address)?;
        self.stack.pop()
    }

    /// Evaluate at `address`, leaving any number of results on the operand
    /// stack. Only legal while no scene is active.
    pub fn execute_eval_multiple(&mut self, address: i32) -> Result<()> {
        self.require_state(State::Inactive)?;

        self.state = State::Eval;
        self.program_counter = address;
        self.dispatch_while(State::Eval)
    }

    // =========================================================================
    // Flags
    // =========================================================================

    /// Evaluate every scene and function flag declaration: run each value
    /// expression, resolve each name expression, record the name, and
    /// write the value through the flag-set callback.
    ///
    /// Returns `true` on the first call. Later calls re-evaluate under the
    /// already-resolved names (as [`Interpreter::reset_flags`]) and return
    /// `false`.
    pub fn initialize_flags(&mut self) -> Result<bool> {
        if self.flags_initialized {
            self.reset_flags()?;
            return Ok(false);
        }

        let scene_count = self.image.borrow().scenes().len();
        for i in 0..scene_count {
            let offsets = self.image.borrow().scenes()[i].flag_offsets.clone();
            for (slot, pair) in offsets.chunks_exact(2).enumerate() {
                let value = self.execute_eval(pair[0])?;
                let name = self.execute_eval(pair[1])?.safe_string()?;
                self.image.borrow_mut().scenes_mut()[i].flag_names[slot] = name.clone();
                (self.hooks.flag_set)(&name, value);
            }
        }

        let function_count = self.image.borrow().functions().len();
        for i in 0..function_count {
            let offsets = self.image.borrow().functions()[i].flag_offsets.clone();
            for (slot, pair) in offsets.chunks_exact(2).enumerate() {
                let value = self.execute_eval(pair[0])?;
                let name = self.execute_eval(pair[1])?.safe_string()?;
                self.image.borrow_mut().functions_mut()[i].flag_names[slot] = name.clone();
                (self.hooks.flag_set)(&name, value);
            }
        }

        self.flags_initialized = true;
        debug!("flags initialized");
        Ok(true)
    }

    /// Re-evaluate every flag value expression and write the results under
    /// the names resolved by initialization.
    pub fn reset_flags(&mut self) -> Result<()> {
        if !self.flags_initialized {
            self.initialize_flags()?;
            return Ok(());
        }

        let scene_count = self.image.borrow().scenes().len();
        for i in 0..scene_count {
            let offsets = self.image.borrow().scenes()[i].flag_offsets.clone();
            for (slot, pair) in offsets.chunks_exact(2).enumerate() {
                let value = self.execute_eval(pair[0])?;
                let name = self.image.borrow().scenes()[i].flag_names[slot].clone();
                (self.hooks.flag_set)(&name, value);
            }
        }

        let function_count = self.image.borrow().functions().len();
        for i in 0..function_count {
            let offsets = self.image.borrow().functions()[i].flag_offsets.clone();
            for (slot, pair) in offsets.chunks_exact(2).enumerate() {
                let value = self.execute_eval(pair[0])?;
                let name = self.image.borrow().functions()[i].flag_names[slot].clone();
                (self.hooks.flag_set)(&name, value);
            }
        }

        Ok(())
    }

    /// Load a translation file over the image, invalidating cached
    /// definition text.
    pub fn load_translation_file(
        &mut self,
        path: impl AsRef<std::path::Path>,
    ) -> fable_image::Result<()> {
        self.image.borrow_mut().load_translation_file(path)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Run the dispatch loop while the interpreter stays in `state`.
    fn dispatch_while(&mut self, state: State) -> Result<()> {
        while self.state == state {
            let opcode_offset = self.program_counter;
            if let Err(err) = self.step() {
                let scene = self.current_scene.as_deref().unwrap_or("<eval>");
                return Err(err.in_scene(scene, opcode_offset));
            }
        }
        Ok(())
    }

    pub(crate) fn require_state(&self, expected: State) -> Result<()> {
        if self.state != expected {
            return Err(RuntimeError::InvalidState {
                expected: expected.name(),
                actual: self.state.name(),
            });
        }
        Ok(())
    }

    fn clear_vm_state(&mut self) {
        self.stack.clear();
        self.call_stack.clear();
        self.locals.clear();
        self.choice_options.clear();
        self.choose_options.clear();
        self.save_register = None;
        self.starting_choice = false;
        self.flag_count = 0;
    }
}
