// fable-embed - Engine implementation
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! The Engine struct - main entry point for embedding Fable.

use std::path::Path;

use fable_image::Image;
use fable_vm::{Interpreter, State, Value};

use crate::convert::{FromValue, IntoValue};
use crate::error::Result;

/// The Fable dialogue engine.
///
/// `Engine` wraps an [`Interpreter`] with typed function registration and
/// a unified error type. It is the recommended surface for games and
/// tools; the interpreter underneath stays reachable for anything not
/// covered here.
///
/// # Thread Safety
///
/// **`Engine` is NOT thread-safe.** It shares the image through `Rc` and
/// `RefCell` internally. Create separate engines for separate threads.
///
/// # Example
///
/// ```no_run
/// use fable_embed::Engine;
///
/// let mut engine = Engine::from_file("game.dxb").unwrap();
/// engine.text_handler(|text| println!("{}", text));
/// engine.choice_handler(|choices| println!("{:?}", choices));
/// engine.register_fn("award_points", |points: i32| points * 10);
///
/// engine.run_scene("intro").unwrap();
/// ```
pub struct Engine {
    vm: Interpreter,
}

/// A Rust closure callable from scripts, with typed arguments.
///
/// Implemented for closures of up to three [`FromValue`] arguments
/// returning any [`IntoValue`] type. Missing arguments arrive as
/// Undefined; extra arguments are ignored.
pub trait ExternalFn<Args> {
    fn call(&mut self, args: &[Value]) -> fable_vm::Result<Value>;
}

macro_rules! impl_external_fn {
    ($($arg:ident : $idx:tt),*) => {
        impl<Func, $($arg,)* Ret> ExternalFn<($($arg,)*)> for Func
        where
            Func: FnMut($($arg),*) -> Ret,
            $($arg: FromValue,)*
            Ret: IntoValue,
        {
            #[allow(unused_variables)]
            fn call(&mut self, args: &[Value]) -> fable_vm::Result<Value> {
                let result = self($($arg::from_value(
                    args.get($idx).unwrap_or(&Value::Undefined),
                )?),*);
                Ok(result.into_value())
            }
        }
    };
}

impl_external_fn!();
impl_external_fn!(A: 0);
impl_external_fn!(A: 0, B: 1);
impl_external_fn!(A: 0, B: 1, C: 2);

impl Engine {
    /// Create an engine over an already-loaded image.
    pub fn new(image: Image) -> Engine {
        Engine {
            vm: Interpreter::new(image),
        }
    }

    /// Load an image from disk and build an engine for it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Engine> {
        Ok(Engine::new(Image::from_file(path)?))
    }

    /// Load an image from memory and build an engine for it.
    pub fn from_bytes(data: &[u8]) -> Result<Engine> {
        Ok(Engine::new(Image::from_bytes(data)?))
    }

    /// The interpreter underneath, for host surface not wrapped here.
    pub fn interpreter(&mut self) -> &mut Interpreter {
        &mut self.vm
    }

    // =========================================================================
    // Host configuration
    // =========================================================================

    /// Set the text callback. Required before running scenes with text.
    pub fn text_handler(&mut self, f: impl FnMut(String) + 'static) -> &mut Self {
        self.vm.text_handler(f);
        self
    }

    /// Set the choice callback. Required before running scenes with
    /// choices.
    pub fn choice_handler(&mut self, f: impl FnMut(Vec<String>) + 'static) -> &mut Self {
        self.vm.choice_handler(f);
        self
    }

    /// Notified with the scene name whenever a scene ends.
    pub fn end_scene_handler(&mut self, f: impl FnMut(&str) + 'static) -> &mut Self {
        self.vm.end_scene_handler(f);
        self
    }

    /// Replace the chance callback deciding whether candidates appear.
    pub fn chance_handler(&mut self, f: impl FnMut(f64) -> bool + 'static) -> &mut Self {
        self.vm.chance_handler(f);
        self
    }

    /// Replace the weighted-chance callback picking a choose branch.
    pub fn weighted_chance_handler(
        &mut self,
        f: impl FnMut(&[f64]) -> usize + 'static,
    ) -> &mut Self {
        self.vm.weighted_chance_handler(f);
        self
    }

    /// Register a typed external function callable from scripts.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # let mut engine = fable_embed::Engine::from_file("game.dxb").unwrap();
    /// engine.register_fn("greet", |name: String| format!("Hello, {}!", name));
    /// engine.register_fn("pi", || 3.14f64);
    /// ```
    pub fn register_fn<Args: 'static>(
        &mut self,
        name: impl Into<String>,
        mut f: impl ExternalFn<Args> + 'static,
    ) -> &mut Self {
        self.vm.register_function(name, move |args| f.call(args));
        self
    }

    /// Register an external function over raw argument slices, for
    /// variadic or fallible handlers.
    pub fn register_raw(
        &mut self,
        name: impl Into<String>,
        f: impl FnMut(&[Value]) -> fable_vm::Result<Value> + 'static,
    ) -> &mut Self {
        self.vm.register_function(name, f);
        self
    }

    // =========================================================================
    // Scene control
    // =========================================================================

    /// Start the named scene and run until it suspends or ends.
    pub fn run_scene(&mut self, name: &str) -> Result<()> {
        Ok(self.vm.run_scene(name)?)
    }

    /// Continue a scene suspended at text or paused.
    pub fn resume_scene(&mut self) -> Result<()> {
        Ok(self.vm.resume_scene()?)
    }

    /// Park a running scene.
    pub fn pause_scene(&mut self) {
        self.vm.pause_scene();
    }

    /// Pick a pending choice by index and continue.
    pub fn select_choice(&mut self, index: usize) -> Result<()> {
        Ok(self.vm.select_choice(index)?)
    }

    /// End the active scene from any state.
    pub fn end_scene(&mut self) {
        self.vm.end_scene();
    }

    /// Current interpreter state.
    pub fn state(&self) -> State {
        self.vm.state()
    }

    /// Names of all scenes in the image.
    #[must_use]
    pub fn scene_names(&mut self) -> Vec<String> {
        self.vm
            .image()
            .borrow()
            .scenes()
            .iter()
            .map(|scene| scene.name.clone())
            .collect()
    }

    // =========================================================================
    // Flags, definitions, translations
    // =========================================================================

    /// Evaluate all flag declarations and seed the flag store. Returns
    /// `true` the first time; later calls re-evaluate and return `false`.
    pub fn initialize_flags(&mut self) -> Result<bool> {
        Ok(self.vm.initialize_flags()?)
    }

    /// Re-evaluate all flag declarations under their resolved names.
    pub fn reset_flags(&mut self) -> Result<()> {
        Ok(self.vm.reset_flags()?)
    }

    /// Evaluate a named definition, using the per-engine cache.
    pub fn definition(&mut self, name: &str) -> Result<String> {
        Ok(self.vm.definition(name)?)
    }

    /// Evaluate a named definition, bypassing the cache.
    pub fn definition_no_cache(&mut self, name: &str) -> Result<String> {
        Ok(self.vm.definition_no_cache(name)?)
    }

    /// Load a translation file over the image.
    pub fn load_translation_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        Ok(self.vm.load_translation_file(path)?)
    }
}
