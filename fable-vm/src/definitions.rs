// fable-vm - Definition evaluation
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Lazy, cache-aware evaluation of named definitions.
//!
//! A definition is a named string, optionally with an interpolation
//! expression compiled to bytecode. Evaluated text is cached per
//! interpreter and keyed to the image's translation generation: swapping a
//! translation file bumps the generation, and the next read recomputes.

use fable_image::Definition;

use crate::error::{Result, RuntimeError};
use crate::interpolate::interpolate;
use crate::vm::Interpreter;

/// Cached evaluation state for one definition.
pub(crate) struct DefinitionInstance {
    pub target: Definition,
    pub cached_value: Option<String>,
    pub cached_id: Option<u64>,
}

impl Interpreter {
    /// Evaluate the named definition, reusing the cached text while the
    /// translation generation is unchanged.
    pub fn definition(&mut self, name: &str) -> Result<String> {
        self.ensure_definition_instance(name)?;

        let current_id = self.image.borrow().cache_id();
        if let Some(instance) = self.definitions.get(name) {
            if instance.cached_id == Some(current_id) {
                if let Some(cached) = &instance.cached_value {
                    return Ok(cached.clone());
                }
            }
        }

        let target = self.definitions[name].target;
        let value = self.evaluate_definition(&target)?;
        if let Some(instance) = self.definitions.get_mut(name) {
            instance.cached_value = Some(value.clone());
            instance.cached_id = Some(current_id);
        }
        Ok(value)
    }

    /// Evaluate the named definition, bypassing and refreshing the cache.
    pub fn definition_no_cache(&mut self, name: &str) -> Result<String> {
        self.ensure_definition_instance(name)?;

        let current_id = self.image.borrow().cache_id();
        let target = self.definitions[name].target;
        let value = self.evaluate_definition(&target)?;
        if let Some(instance) = self.definitions.get_mut(name) {
            instance.cached_value = Some(value.clone());
            instance.cached_id = Some(current_id);
        }
        Ok(value)
    }

    fn ensure_definition_instance(&mut self, name: &str) -> Result<()> {
        if !self.definitions.contains_key(name) {
            let target = self
                .image
                .borrow()
                .definition(name)
                .copied()
                .ok_or_else(|| RuntimeError::UnknownDefinition(name.to_string()))?;
            self.definitions.insert(
                name.to_string(),
                DefinitionInstance {
                    target,
                    cached_value: None,
                    cached_id: None,
                },
            );
        }
        Ok(())
    }

    fn evaluate_definition(&mut self, target: &Definition) -> Result<String> {
        if target.code_offset == -1 {
            return self.definition_base_string(target);
        }

        // Run the interpolation expression and drain everything it left on
        // the stack; the top of the stack is positional argument 0.
        self.execute_eval_multiple(target.code_offset)?;
        let mut args = Vec::with_capacity(self.stack.len());
        while !self.stack.is_empty() {
            args.push(self.stack.pop()?.safe_string()?);
        }

        let base = self.definition_base_string(target)?;
        Ok(interpolate(&base, &args))
    }

    fn definition_base_string(&self, target: &Definition) -> Result<String> {
        let img = self.image.borrow();
        let base = if target.is_internal {
            img.string(target.value_string_index)
        } else {
            img.translation(target.value_string_index)
        };
        base.map(str::to_owned)
            .ok_or(RuntimeError::BadStringIndex {
                index: target.value_string_index as i32,
            })
    }
}
