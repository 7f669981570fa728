// fable-vm - Opcode dispatch
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! One-opcode execution step for the interpreter.

use std::mem;

use crate::error::{Result, RuntimeError};
use crate::frame::CallFrame;
use crate::interpolate::interpolate;
use crate::opcode::Opcode;
use crate::ops::BinaryOp;
use crate::value::Value;
use crate::vm::{ChoiceEntry, ChooseEntry, Interpreter, State};

impl Interpreter {
    /// Fetch and execute the opcode at the program counter, advancing it
    /// past the opcode and its immediates.
    pub(crate) fn step(&mut self) -> Result<()> {
        let opcode_offset = self.program_counter;
        let byte = self.fetch_u8()?;
        let op = Opcode::from_byte(byte).ok_or(RuntimeError::BadOpcode {
            byte,
            offset: opcode_offset,
        })?;

        match op {
            Opcode::Nop => {}

            Opcode::FreeLocal => {
                let id = self.fetch_i32()?;
                if id >= 0 && (id as usize) + 1 == self.locals.len() {
                    if (id as usize) < self.flag_count {
                        if !self.flags_initialized {
                            return Err(RuntimeError::UninitializedFlags);
                        }
                        let name = {
                            let img = self.image.borrow();
                            self.current_scene
                                .as_deref()
                                .and_then(|scene| img.scene(scene))
                                .and_then(|scene| scene.flag_names.get(id as usize).cloned())
                        };
                        if let Some(name) = name {
                            let value = self.locals[id as usize].clone();
                            (self.hooks.flag_set)(&name, value);
                        }
                    }
                    self.locals.pop();
                }
            }

            Opcode::Save => {
                self.save_register = Some(self.stack.peek()?);
            }

            Opcode::Load => {
                let value = self.save_register.take().unwrap_or(Value::Undefined);
                self.stack.push(value);
            }

            Opcode::PushUndefined => self.stack.push(Value::Undefined),

            Opcode::PushInt => {
                let value = self.fetch_i32()?;
                self.stack.push(Value::Integer(value));
            }

            Opcode::PushDouble => {
                let value = self.fetch_f64()?;
                self.stack.push(Value::Double(value));
            }

            Opcode::PushString => {
                let idx = self.fetch_i32()?;
                let text = self.image_translation(idx)?;
                self.stack.push(Value::String(text));
            }

            Opcode::PushBinaryString => {
                let idx = self.fetch_i32()?;
                let text = self.image_string(idx)?;
                self.stack.push(Value::String(text));
            }

            Opcode::PushInterpolatedString | Opcode::PushBinaryInterpolatedString => {
                let idx = self.fetch_i32()?;
                let count = self.fetch_i32()?;
                let template = if op == Opcode::PushInterpolatedString {
                    self.image_translation(idx)?
                } else {
                    self.image_string(idx)?
                };

                // Top of stack is positional argument 0.
                let mut args = Vec::with_capacity(count.max(0) as usize);
                for _ in 0..count {
                    args.push(self.stack.pop()?.safe_string()?);
                }
                self.stack
                    .push(Value::String(interpolate(&template, &args)));
            }

            Opcode::MakeArray => {
                let size = self.fetch_i32()?.max(0) as usize;
                let mut items = vec![Value::Undefined; size];
                for slot in items.iter_mut().rev() {
                    *slot = self.stack.pop()?;
                }
                self.stack.push(Value::Array(items));
            }

            Opcode::PushArrayIndex => {
                let index = self.stack.pop()?.safe_int()?;
                match self.stack.pop()? {
                    Value::Array(items) => {
                        let value = usize::try_from(index)
                            .ok()
                            .and_then(|i| items.get(i).cloned())
                            .ok_or(RuntimeError::IndexOutOfBounds {
                                index,
                                len: items.len(),
                            })?;
                        self.stack.push(value);
                    }
                    other => {
                        return Err(RuntimeError::TypeMismatch {
                            expected: "Array",
                            got: other.type_name(),
                        });
                    }
                }
            }

            Opcode::SetArrayIndex => {
                let value = self.stack.pop()?;
                let index = self.stack.pop()?.safe_int()?;
                match self.stack.peek_mut()? {
                    Value::Array(items) => {
                        let len = items.len();
                        let slot = usize::try_from(index)
                            .ok()
                            .and_then(|i| items.get_mut(i))
                            .ok_or(RuntimeError::IndexOutOfBounds { index, len })?;
                        *slot = value;
                    }
                    other => {
                        return Err(RuntimeError::TypeMismatch {
                            expected: "Array",
                            got: other.type_name(),
                        });
                    }
                }
            }

            Opcode::SetVarGlobal => {
                let name_idx = self.stack.pop()?.safe_int()?;
                let name = self.image_string(name_idx)?;
                let value = self.stack.pop()?;
                (self.hooks.variable_set)(&name, value);
            }

            Opcode::SetVarLocal => {
                let id = self.fetch_i32()?;
                let value = self.stack.pop()?;
                let slot = usize::try_from(id).map_err(|_| RuntimeError::LocalOutOfRange {
                    index: id,
                    len: self.locals.len(),
                })?;
                if slot >= self.locals.len() {
                    self.locals.resize(slot, Value::Undefined);
                    self.locals.push(value);
                } else {
                    self.locals[slot] = value;
                }
            }

            Opcode::PushVarGlobal => {
                let name_idx = self.stack.pop()?.safe_int()?;
                let name = self.image_string(name_idx)?;
                let value = (self.hooks.variable_get)(&name);
                self.stack.push(value);
            }

            Opcode::PushVarLocal => {
                let id = self.fetch_i32()?;
                let value = usize::try_from(id)
                    .ok()
                    .and_then(|slot| self.locals.get(slot).cloned())
                    .unwrap_or(Value::Undefined);
                self.stack.push(value);
            }

            Opcode::Pop => {
                self.stack.pop()?;
            }

            Opcode::Dup => {
                let top = self.stack.peek()?;
                self.stack.push(top);
            }

            Opcode::Dup2 => {
                let first = self.stack.pop()?;
                let second = self.stack.pop()?;
                self.stack.push(second.clone());
                self.stack.push(first.clone());
                self.stack.push(second);
                self.stack.push(first);
            }

            Opcode::Add => self.binary_op(BinaryOp::Add)?,
            Opcode::Sub => self.binary_op(BinaryOp::Sub)?,
            Opcode::Mul => self.binary_op(BinaryOp::Mul)?,
            Opcode::Div => self.binary_op(BinaryOp::Div)?,
            Opcode::Mod => self.binary_op(BinaryOp::Mod)?,

            Opcode::Neg => {
                let value = match self.stack.pop()? {
                    Value::Integer(i) => Value::Integer(i.wrapping_neg()),
                    Value::Double(d) => Value::Double(-d),
                    other => {
                        return Err(RuntimeError::InvalidOperator {
                            op: "neg",
                            ty: other.type_name(),
                        });
                    }
                };
                self.stack.push(value);
            }

            Opcode::Inv => {
                let value = match self.stack.pop()? {
                    Value::Integer(i) => Value::Integer(if i == 0 { 1 } else { 0 }),
                    Value::Double(d) => Value::Double(if d == 0.0 { 1.0 } else { 0.0 }),
                    other => {
                        return Err(RuntimeError::InvalidOperator {
                            op: "inv",
                            ty: other.type_name(),
                        });
                    }
                };
                self.stack.push(value);
            }

            Opcode::BitShiftLeft
            | Opcode::BitShiftRight
            | Opcode::BitAnd
            | Opcode::BitOr
            | Opcode::BitXor => {
                let rhs = self.stack.pop()?.safe_int()?;
                let lhs = self.stack.pop()?.safe_int()?;
                let value = match op {
                    Opcode::BitShiftLeft => lhs.wrapping_shl(rhs as u32),
                    Opcode::BitShiftRight => lhs.wrapping_shr(rhs as u32),
                    Opcode::BitAnd => lhs & rhs,
                    Opcode::BitOr => lhs | rhs,
                    _ => lhs ^ rhs,
                };
                self.stack.push(Value::Integer(value));
            }

            Opcode::BitNegate => {
                let value = self.stack.pop()?.safe_int()?;
                self.stack.push(Value::Integer(!value));
            }

            Opcode::Pow => {
                let rhs = self.stack.pop()?.safe_double()?;
                let lhs = self.stack.pop()?.safe_double()?;
                // The result carries the Integer tag; generated code relies
                // on it.
                self.stack.push(Value::Integer(lhs.powf(rhs) as i32));
            }

            Opcode::CompareEq => self.binary_op(BinaryOp::Eq)?,
            Opcode::CompareGt => self.binary_op(BinaryOp::Gt)?,
            Opcode::CompareLt => self.binary_op(BinaryOp::Lt)?,
            Opcode::CompareGte => self.binary_op(BinaryOp::Gte)?,
            Opcode::CompareLte => self.binary_op(BinaryOp::Lte)?,
            Opcode::CompareNeq => self.binary_op(BinaryOp::Neq)?,

            Opcode::Jump => {
                let rel = self.fetch_i32()?;
                self.program_counter = self.program_counter.wrapping_add(rel);
            }

            Opcode::JumpTruthy => {
                let rel = self.fetch_i32()?;
                if self.stack.pop()?.safe_int()? != 0 {
                    self.program_counter = self.program_counter.wrapping_add(rel);
                }
            }

            Opcode::JumpFalsy => {
                let rel = self.fetch_i32()?;
                if self.stack.pop()?.safe_int()? == 0 {
                    self.program_counter = self.program_counter.wrapping_add(rel);
                }
            }

            Opcode::Exit => {
                if self.state == State::Eval {
                    self.state = State::Inactive;
                } else if self.call_stack.is_empty() {
                    self.end_scene();
                } else {
                    self.restore_frame(Value::Undefined);
                }
            }

            Opcode::Return => {
                if self.call_stack.is_empty() {
                    self.end_scene();
                } else {
                    let return_value = self.stack.pop()?;
                    self.restore_frame(return_value);
                }
            }

            Opcode::Call => {
                let func_id = self.fetch_i32()?;
                let argc = self.fetch_i32()?.max(0) as usize;

                let mut args = Vec::with_capacity(argc);
                for _ in 0..argc {
                    args.push(self.stack.pop()?);
                }

                let (code_offset, flag_names) = {
                    let img = self.image.borrow();
                    let func = u32::try_from(func_id)
                        .ok()
                        .and_then(|id| img.function(id))
                        .ok_or(RuntimeError::BadFunctionIndex { index: func_id })?;
                    (func.code_offset, func.flag_names.clone())
                };

                self.call_stack.push(CallFrame {
                    return_offset: self.program_counter,
                    stack: mem::take(&mut self.stack),
                    locals: mem::take(&mut self.locals),
                    flag_count: self.flag_count,
                });

                self.program_counter = code_offset;
                self.flag_count = flag_names.len();
                for flag_name in &flag_names {
                    let value = (self.hooks.flag_get)(flag_name);
                    self.locals.push(value);
                }
                self.locals.extend(args);
            }

            Opcode::CallExternal => {
                let name_idx = self.fetch_i32()?;
                let argc = self.fetch_i32()?.max(0) as usize;
                let name = self.image_string(name_idx)?;

                let mut args = Vec::with_capacity(argc);
                for _ in 0..argc {
                    args.push(self.stack.pop()?);
                }

                let result = match self.hooks.functions.get_mut(&name) {
                    Some(func) => func(&args)?,
                    None => {
                        (self.hooks.unregistered_function)(&name)?;
                        Value::Undefined
                    }
                };
                self.stack.push(result);
            }

            Opcode::ChoiceBegin => {
                self.require_state(State::Running)?;
                if self.starting_choice {
                    return Err(RuntimeError::InvalidState {
                        expected: "Running",
                        actual: "building a choice",
                    });
                }
                self.starting_choice = true;
            }

            Opcode::ChoiceAdd => {
                self.require_choice_building()?;
                let rel = self.fetch_i32()?;
                let chance = self.stack.pop()?.safe_double()?;
                let text = self.stack.pop()?.safe_string()?;
                if (self.hooks.chance)(chance) {
                    self.choice_options.push(ChoiceEntry {
                        target_offset: self.program_counter.wrapping_add(rel),
                        text,
                    });
                }
            }

            Opcode::ChoiceAddTruthy => {
                self.require_choice_building()?;
                let rel = self.fetch_i32()?;
                let condition = self.stack.pop()?.safe_int()? != 0;
                let chance = self.stack.pop()?.safe_double()?;
                let text = self.stack.pop()?.safe_string()?;
                if condition && (self.hooks.chance)(chance) {
                    self.choice_options.push(ChoiceEntry {
                        target_offset: self.program_counter.wrapping_add(rel),
                        text,
                    });
                }
            }

            Opcode::ChoiceSelect => {
                self.require_choice_building()?;
                if self.choice_options.is_empty() {
                    return Err(RuntimeError::NoChoices);
                }

                self.starting_choice = false;
                self.state = State::InChoice;

                let texts: Vec<String> = self
                    .choice_options
                    .iter()
                    .map(|entry| entry.text.clone())
                    .collect();
                self.hooks.run_choice(texts)?;
            }

            Opcode::ChooseAdd => {
                let rel = self.fetch_i32()?;
                let chance = self.stack.pop()?.safe_double()?;
                self.choose_options.push(ChooseEntry {
                    target_offset: self.program_counter.wrapping_add(rel),
                    chance,
                });
            }

            Opcode::ChooseAddTruthy => {
                let rel = self.fetch_i32()?;
                let condition = self.stack.pop()?.safe_int()? != 0;
                // The chance is consumed whether or not the entry appears;
                // generated code relies on the stack depth.
                let chance = self.stack.pop()?.safe_double()?;
                if condition {
                    self.choose_options.push(ChooseEntry {
                        target_offset: self.program_counter.wrapping_add(rel),
                        chance,
                    });
                }
            }

            Opcode::ChooseSelect => {
                if self.choose_options.is_empty() {
                    return Err(RuntimeError::NoChoices);
                }

                let weights: Vec<f64> = self
                    .choose_options
                    .iter()
                    .map(|entry| entry.chance)
                    .collect();
                let index = (self.hooks.weighted_chance)(&weights);
                let target = self
                    .choose_options
                    .get(index)
                    .map(|entry| entry.target_offset)
                    .ok_or(RuntimeError::BadSelection {
                        index,
                        len: self.choose_options.len(),
                    })?;

                self.program_counter = target;
                self.choose_options.clear();
            }

            Opcode::TextRun => {
                self.require_state(State::Running)?;
                self.state = State::InText;
                let text = self.stack.pop()?.safe_string()?;
                self.hooks.run_text(text)?;
            }
        }

        Ok(())
    }

    fn binary_op(&mut self, op: BinaryOp) -> Result<()> {
        let rhs = self.stack.pop()?;
        let lhs = self.stack.pop()?;
        let result = lhs.binary(op, &rhs)?;
        self.stack.push(result);
        Ok(())
    }

    /// Pop the top call frame and restore its stack, locals and flag
    /// count, pushing `result` as the call's value.
    fn restore_frame(&mut self, result: Value) {
        if let Some(frame) = self.call_stack.pop() {
            self.program_counter = frame.return_offset;
            self.stack = frame.stack;
            self.locals = frame.locals;
            self.flag_count = frame.flag_count;
            self.stack.push(result);
        }
    }

    fn require_choice_building(&self) -> Result<()> {
        if !self.starting_choice {
            return Err(RuntimeError::InvalidState {
                expected: "building a choice",
                actual: self.state.name(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // Instruction fetch
    // =========================================================================

    fn fetch_u8(&mut self) -> Result<u8> {
        let pc = self.program_counter;
        let byte = {
            let img = self.image.borrow();
            let code = img.instructions();
            if pc < 0 || pc as usize >= code.len() {
                return Err(RuntimeError::CodeOutOfBounds { offset: pc });
            }
            code[pc as usize]
        };
        self.program_counter = pc.wrapping_add(1);
        Ok(byte)
    }

    fn fetch_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.fetch_bytes(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    fn fetch_f64(&mut self) -> Result<f64> {
        let mut buf = [0u8; 8];
        self.fetch_bytes(&mut buf)?;
        Ok(f64::from_le_bytes(buf))
    }

    fn fetch_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let pc = self.program_counter;
        {
            let img = self.image.borrow();
            let code = img.instructions();
            let start = if pc >= 0 { pc as usize } else { code.len() };
            let end = start.saturating_add(buf.len());
            if end > code.len() {
                return Err(RuntimeError::CodeOutOfBounds { offset: pc });
            }
            buf.copy_from_slice(&code[start..end]);
        }
        self.program_counter = pc.wrapping_add(buf.len() as i32);
        Ok(())
    }

    /// Clone a string out of the internal string table.
    fn image_string(&self, index: i32) -> Result<String> {
        let img = self.image.borrow();
        u32::try_from(index)
            .ok()
            .and_then(|i| img.string(i))
            .map(str::to_owned)
            .ok_or(RuntimeError::BadStringIndex { index })
    }

    /// Clone a string out of the translation table.
    fn image_translation(&self, index: i32) -> Result<String> {
        let img = self.image.borrow();
        u32::try_from(index)
            .ok()
            .and_then(|i| img.translation(i))
            .map(str::to_owned)
            .ok_or(RuntimeError::BadStringIndex { index })
    }
}
