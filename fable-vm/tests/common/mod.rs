// fable-vm - Shared test helpers
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Test support: a tiny bytecode assembler and host-side capture buffers.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use fable_vm::{Interpreter, Opcode, Value};

/// Assembles instruction buffers for tests, with label-based jumps.
///
/// Relative jump immediates are resolved against the program counter
/// after the immediate has been consumed, matching the interpreter.
#[derive(Default)]
pub struct Asm {
    code: Vec<u8>,
    labels: HashMap<String, i32>,
    patches: Vec<(usize, String)>,
}

impl Asm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current offset; use to record scene and function entry points.
    pub fn pos(&self) -> i32 {
        self.code.len() as i32
    }

    /// Define a jump target at the current offset.
    pub fn label(&mut self, name: &str) -> &mut Self {
        self.labels.insert(name.to_string(), self.pos());
        self
    }

    fn op(&mut self, op: Opcode) -> &mut Self {
        self.code.push(op as u8);
        self
    }

    fn imm_i32(&mut self, value: i32) -> &mut Self {
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn op_label(&mut self, op: Opcode, target: &str) -> &mut Self {
        self.op(op);
        self.patches.push((self.code.len(), target.to_string()));
        self.imm_i32(0)
    }

    pub fn nop(&mut self) -> &mut Self {
        self.op(Opcode::Nop)
    }

    pub fn free_local(&mut self, id: i32) -> &mut Self {
        self.op(Opcode::FreeLocal).imm_i32(id)
    }

    pub fn save(&mut self) -> &mut Self {
        self.op(Opcode::Save)
    }

    pub fn load(&mut self) -> &mut Self {
        self.op(Opcode::Load)
    }

    pub fn push_undefined(&mut self) -> &mut Self {
        self.op(Opcode::PushUndefined)
    }

    pub fn push_int(&mut self, value: i32) -> &mut Self {
        self.op(Opcode::PushInt).imm_i32(value)
    }

    pub fn push_double(&mut self, value: f64) -> &mut Self {
        self.op(Opcode::PushDouble);
        self.code.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn push_string(&mut self, idx: u32) -> &mut Self {
        self.op(Opcode::PushString).imm_i32(idx as i32)
    }

    pub fn push_binary_string(&mut self, idx: u32) -> &mut Self {
        self.op(Opcode::PushBinaryString).imm_i32(idx as i32)
    }

    pub fn push_interpolated(&mut self, idx: u32, count: i32) -> &mut Self {
        self.op(Opcode::PushInterpolatedString)
            .imm_i32(idx as i32)
            .imm_i32(count)
    }

    pub fn push_binary_interpolated(&mut self, idx: u32, count: i32) -> &mut Self {
        self.op(Opcode::PushBinaryInterpolatedString)
            .imm_i32(idx as i32)
            .imm_i32(count)
    }

    pub fn make_array(&mut self, size: i32) -> &mut Self {
        self.op(Opcode::MakeArray).imm_i32(size)
    }

    pub fn push_array_index(&mut self) -> &mut Self {
        self.op(Opcode::PushArrayIndex)
    }

    pub fn set_array_index(&mut self) -> &mut Self {
        self.op(Opcode::SetArrayIndex)
    }

    pub fn set_var_global(&mut self) -> &mut Self {
        self.op(Opcode::SetVarGlobal)
    }

    pub fn set_var_local(&mut self, id: i32) -> &mut Self {
        self.op(Opcode::SetVarLocal).imm_i32(id)
    }

    pub fn push_var_global(&mut self) -> &mut Self {
        self.op(Opcode::PushVarGlobal)
    }

    pub fn push_var_local(&mut self, id: i32) -> &mut Self {
        self.op(Opcode::PushVarLocal).imm_i32(id)
    }

    pub fn pop(&mut self) -> &mut Self {
        self.op(Opcode::Pop)
    }

    pub fn dup(&mut self) -> &mut Self {
        self.op(Opcode::Dup)
    }

    pub fn dup2(&mut self) -> &mut Self {
        self.op(Opcode::Dup2)
    }

    pub fn add(&mut self) -> &mut Self {
        self.op(Opcode::Add)
    }

    pub fn sub(&mut self) -> &mut Self {
        self.op(Opcode::Sub)
    }

    pub fn mul(&mut self) -> &mut Self {
        self.op(Opcode::Mul)
    }

    pub fn div(&mut self) -> &mut Self {
        self.op(Opcode::Div)
    }

    pub fn modulo(&mut self) -> &mut Self {
        self.op(Opcode::Mod)
    }

    pub fn neg(&mut self) -> &mut Self {
        self.op(Opcode::Neg)
    }

    pub fn inv(&mut self) -> &mut Self {
        self.op(Opcode::Inv)
    }

    pub fn bit_shift_left(&mut self) -> &mut Self {
        self.op(Opcode::BitShiftLeft)
    }

    pub fn bit_shift_right(&mut self) -> &mut Self {
        self.op(Opcode::BitShiftRight)
    }

    pub fn bit_and(&mut self) -> &mut Self {
        self.op(Opcode::BitAnd)
    }

    pub fn bit_or(&mut self) -> &mut Self {
        self.op(Opcode::BitOr)
    }

    pub fn bit_xor(&mut self) -> &mut Self {
        self.op(Opcode::BitXor)
    }

    pub fn bit_negate(&mut self) -> &mut Self {
        self.op(Opcode::BitNegate)
    }

    pub fn pow(&mut self) -> &mut Self {
        self.op(Opcode::Pow)
    }

    pub fn cmp_eq(&mut self) -> &mut Self {
        self.op(Opcode::CompareEq)
    }

    pub fn cmp_gt(&mut self) -> &mut Self {
        self.op(Opcode::CompareGt)
    }

    pub fn cmp_lt(&mut self) -> &mut Self {
        self.op(Opcode::CompareLt)
    }

    pub fn cmp_gte(&mut self) -> &mut Self {
        self.op(Opcode::CompareGte)
    }

    pub fn cmp_lte(&mut self) -> &mut Self {
        self.op(Opcode::CompareLte)
    }

    pub fn cmp_neq(&mut self) -> &mut Self {
        self.op(Opcode::CompareNeq)
    }

    pub fn jump(&mut self, target: &str) -> &mut Self {
        self.op_label(Opcode::Jump, target)
    }

    pub fn jump_truthy(&mut self, target: &str) -> &mut Self {
        self.op_label(Opcode::JumpTruthy, target)
    }

    pub fn jump_falsy(&mut self, target: &str) -> &mut Self {
        self.op_label(Opcode::JumpFalsy, target)
    }

    pub fn exit(&mut self) -> &mut Self {
        self.op(Opcode::Exit)
    }

    pub fn ret(&mut self) -> &mut Self {
        self.op(Opcode::Return)
    }

    pub fn call(&mut self, func_id: u32, argc: i32) -> &mut Self {
        self.op(Opcode::Call).imm_i32(func_id as i32).imm_i32(argc)
    }

    pub fn call_external(&mut self, name_idx: u32, argc: i32) -> &mut Self {
        self.op(Opcode::CallExternal)
            .imm_i32(name_idx as i32)
            .imm_i32(argc)
    }

    pub fn choice_begin(&mut self) -> &mut Self {
        self.op(Opcode::ChoiceBegin)
    }

    pub fn choice_add(&mut self, target: &str) -> &mut Self {
        self.op_label(Opcode::ChoiceAdd, target)
    }

    pub fn choice_add_truthy(&mut self, target: &str) -> &mut Self {
        self.op_label(Opcode::ChoiceAddTruthy, target)
    }

    pub fn choice_select(&mut self) -> &mut Self {
        self.op(Opcode::ChoiceSelect)
    }

    pub fn choose_add(&mut self, target: &str) -> &mut Self {
        self.op_label(Opcode::ChooseAdd, target)
    }

    pub fn choose_add_truthy(&mut self, target: &str) -> &mut Self {
        self.op_label(Opcode::ChooseAddTruthy, target)
    }

    pub fn choose_select(&mut self) -> &mut Self {
        self.op(Opcode::ChooseSelect)
    }

    pub fn text_run(&mut self) -> &mut Self {
        self.op(Opcode::TextRun)
    }

    /// Resolve label patches and return the instruction buffer.
    pub fn finish(mut self) -> Vec<u8> {
        for (site, target) in std::mem::take(&mut self.patches) {
            let target_pos = *self
                .labels
                .get(&target)
                .unwrap_or_else(|| panic!("undefined label '{}'", target));
            // Jumps are relative to the pc after the 4-byte immediate.
            let rel = target_pos - (site as i32 + 4);
            self.code[site..site + 4].copy_from_slice(&rel.to_le_bytes());
        }
        self.code
    }
}

/// Host-side capture buffers: texts, choice lists, and ended scenes.
pub struct Capture {
    pub texts: Rc<RefCell<Vec<String>>>,
    pub choices: Rc<RefCell<Vec<String>>>,
    pub ended: Rc<RefCell<Vec<String>>>,
}

impl Capture {
    pub fn new() -> Self {
        Self {
            texts: Rc::new(RefCell::new(Vec::new())),
            choices: Rc::new(RefCell::new(Vec::new())),
            ended: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Install capturing text/choice/end-scene handlers on a VM.
    pub fn install(&self, vm: &mut Interpreter) {
        let texts = Rc::clone(&self.texts);
        vm.text_handler(move |text| texts.borrow_mut().push(text));

        let choices = Rc::clone(&self.choices);
        vm.choice_handler(move |options| *choices.borrow_mut() = options);

        let ended = Rc::clone(&self.ended);
        vm.end_scene_handler(move |name| ended.borrow_mut().push(name.to_string()));
    }

    pub fn last_text(&self) -> String {
        self.texts.borrow().last().cloned().unwrap_or_default()
    }
}

/// A shared flag or variable store for tests, installable on a VM.
pub struct Store {
    pub values: Rc<RefCell<HashMap<String, Value>>>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            values: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Install this store as the VM's flag store.
    pub fn install_flags(&self, vm: &mut Interpreter) {
        let read = Rc::clone(&self.values);
        vm.flag_get_handler(move |name| {
            read.borrow().get(name).cloned().unwrap_or(Value::Undefined)
        });
        let write = Rc::clone(&self.values);
        vm.flag_set_handler(move |name, value| {
            write.borrow_mut().insert(name.to_string(), value);
        });
    }

    /// Install this store as the VM's global-variable store.
    pub fn install_variables(&self, vm: &mut Interpreter) {
        let read = Rc::clone(&self.values);
        vm.variable_get_handler(move |name| {
            read.borrow().get(name).cloned().unwrap_or(Value::Undefined)
        });
        let write = Rc::clone(&self.values);
        vm.variable_set_handler(move |name, value| {
            write.borrow_mut().insert(name.to_string(), value);
        });
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.borrow().get(name).cloned()
    }
}
