// fable-vm - State machine tests
// Copyright (c) 2025 Tom Waddington. MIT licensed.

//! Interpreter state transitions, suspension, cancellation, and misuse.

mod common;

use common::{Asm, Capture};
use fable_image::{Image, ImageWriter};
use fable_vm::{Interpreter, RuntimeError, State};

/// An image with a scene that runs two texts, then a choice.
fn two_texts_then_choice() -> Image {
    let mut writer = ImageWriter::new();
    let scene = writer.add_string("demo");
    let first = writer.add_string("first");
    let second = writer.add_string("second");
    let pick = writer.add_string("pick me");

    let mut asm = Asm::new();
    asm.push_binary_string(first)
        .text_run()
        .push_binary_string(second)
        .text_run()
        .choice_begin()
        .push_binary_string(pick)
        .push_double(1.0)
        .choice_add("end")
        .choice_select()
        .label("end")
        .exit();
    writer.set_instructions(asm.finish());
    writer.add_scene(scene, 0, vec![]);
    Image::from_bytes(&writer.to_bytes()).unwrap()
}

#[test]
fn test_suspension_sequence() {
    let mut vm = Interpreter::new(two_texts_then_choice());
    let capture = Capture::new();
    capture.install(&mut vm);

    assert_eq!(vm.state(), State::Inactive);
    vm.run_scene("demo").unwrap();
    assert_eq!(vm.state(), State::InText);
    vm.resume_scene().unwrap();
    assert_eq!(vm.state(), State::InText);
    vm.resume_scene().unwrap();
    assert_eq!(vm.state(), State::InChoice);
    vm.select_choice(0).unwrap();
    assert_eq!(vm.state(), State::Inactive);

    assert_eq!(
        *capture.texts.borrow(),
        vec!["first".to_string(), "second".to_string()]
    );
    assert_eq!(*capture.ended.borrow(), vec!["demo".to_string()]);
}

#[test]
fn test_end_scene_from_any_state_fires_once() {
    // From InText.
    let mut vm = Interpreter::new(two_texts_then_choice());
    let capture = Capture::new();
    capture.install(&mut vm);
    vm.run_scene("demo").unwrap();
    vm.end_scene();
    assert_eq!(vm.state(), State::Inactive);
    assert_eq!(capture.ended.borrow().len(), 1);

    // From InChoice.
    let mut vm = Interpreter::new(two_texts_then_choice());
    let capture = Capture::new();
    capture.install(&mut vm);
    vm.run_scene("demo").unwrap();
    vm.resume_scene().unwrap();
    vm.resume_scene().unwrap();
    assert_eq!(vm.state(), State::InChoice);
    vm.end_scene();
    assert_eq!(vm.state(), State::Inactive);
    assert_eq!(capture.ended.borrow().len(), 1);
}

#[test]
fn test_end_scene_clears_pending_choices() {
    let mut vm = Interpreter::new(two_texts_then_choice());
    let capture = Capture::new();
    capture.install(&mut vm);
    vm.run_scene("demo").unwrap();
    vm.resume_scene().unwrap();
    vm.resume_scene().unwrap();
    vm.end_scene();

    // The old selection is gone; selecting now is a state error.
    assert!(matches!(
        vm.select_choice(0),
        Err(RuntimeError::InvalidState { .. })
    ));
}

#[test]
fn test_select_choice_requires_choice_state() {
    let mut vm = Interpreter::new(two_texts_then_choice());
    let capture = Capture::new();
    capture.install(&mut vm);
    vm.run_scene("demo").unwrap();
    assert!(matches!(
        vm.select_choice(0),
        Err(RuntimeError::InvalidState {
            expected: "InChoice",
            actual: "InText"
        })
    ));
}

#[test]
fn test_select_choice_index_out_of_range() {
    let mut vm = Interpreter::new(two_texts_then_choice());
    let capture = Capture::new();
    capture.install(&mut vm);
    vm.run_scene("demo").unwrap();
    vm.resume_scene().unwrap();
    vm.resume_scene().unwrap();
    assert!(matches!(
        vm.select_choice(5),
        Err(RuntimeError::BadSelection { index: 5, len: 1 })
    ));
}

#[test]
fn test_eval_requires_inactive() {
    let mut vm = Interpreter::new(two_texts_then_choice());
    let capture = Capture::new();
    capture.install(&mut vm);
    vm.run_scene("demo").unwrap();
    assert_eq!(vm.state(), State::InText);
    assert!(matches!(
        vm.execute_eval(0),
        Err(RuntimeError::InvalidState {
            expected: "Inactive",
            actual: "InText"
        })
    ));
}

#[test]
fn test_pause_and_resume() {
    let mut vm = Interpreter::new(two_texts_then_choice());
    let capture = Capture::new();
    capture.install(&mut vm);

    // Pausing outside a running dispatch does nothing.
    vm.pause_scene();
    assert_eq!(vm.state(), State::Inactive);

    vm.run_scene("demo").unwrap();
    vm.pause_scene();
    assert_eq!(vm.state(), State::InText);

    vm.resume_scene().unwrap();
    assert_eq!(vm.state(), State::InText);
    assert_eq!(capture.texts.borrow().len(), 2);
}

#[test]
fn test_missing_text_handler() {
    let mut writer = ImageWriter::new();
    let scene = writer.add_string("silent");
    let hello = writer.add_string("hi");
    let mut asm = Asm::new();
    asm.push_binary_string(hello).text_run().exit();
    writer.set_instructions(asm.finish());
    writer.add_scene(scene, 0, vec![]);

    let mut vm = Interpreter::new(Image::from_bytes(&writer.to_bytes()).unwrap());
    let err = vm.run_scene("silent").unwrap_err();
    let source = match err {
        RuntimeError::InScene { source, .. } => *source,
        other => other,
    };
    assert!(matches!(source, RuntimeError::HostMissing("text")));
}

#[test]
fn test_runtime_error_carries_scene_and_offset() {
    let mut writer = ImageWriter::new();
    let scene = writer.add_string("broken");
    let mut asm = Asm::new();
    asm.nop().pop().exit();
    writer.set_instructions(asm.finish());
    writer.add_scene(scene, 0, vec![]);

    let mut vm = Interpreter::new(Image::from_bytes(&writer.to_bytes()).unwrap());
    let err = vm.run_scene("broken").unwrap_err();
    match err {
        RuntimeError::InScene {
            scene,
            offset,
            source,
        } => {
            assert_eq!(scene, "broken");
            assert_eq!(offset, 1);
            assert!(matches!(*source, RuntimeError::StackUnderflow));
        }
        other => panic!("expected InScene annotation, got {:?}", other),
    }
}

#[test]
fn test_bad_opcode_byte() {
    let mut writer = ImageWriter::new();
    let scene = writer.add_string("garbage");
    writer.set_instructions(vec![0xEE]);
    writer.add_scene(scene, 0, vec![]);

    let mut vm = Interpreter::new(Image::from_bytes(&writer.to_bytes()).unwrap());
    let err = vm.run_scene("garbage").unwrap_err();
    let source = match err {
        RuntimeError::InScene { source, .. } => *source,
        other => other,
    };
    assert!(matches!(
        source,
        RuntimeError::BadOpcode {
            byte: 0xEE,
            offset: 0
        }
    ));
}

#[test]
fn test_running_off_the_code_buffer() {
    let mut writer = ImageWriter::new();
    let scene = writer.add_string("runaway");
    writer.set_instructions(vec![0x00]); // nop, then nothing
    writer.add_scene(scene, 0, vec![]);

    let mut vm = Interpreter::new(Image::from_bytes(&writer.to_bytes()).unwrap());
    let err = vm.run_scene("runaway").unwrap_err();
    let source = match err {
        RuntimeError::InScene { source, .. } => *source,
        other => other,
    };
    assert!(matches!(
        source,
        RuntimeError::CodeOutOfBounds { offset: 1 }
    ));
}

#[test]
fn test_scene_restart_clears_stale_state() {
    let mut vm = Interpreter::new(two_texts_then_choice());
    let capture = Capture::new();
    capture.install(&mut vm);

    vm.run_scene("demo").unwrap();
    vm.end_scene();

    // A fresh run starts from the beginning with clean stacks.
    vm.run_scene("demo").unwrap();
    assert_eq!(vm.state(), State::InText);
    assert_eq!(
        *capture.texts.borrow(),
        vec!["first".to_string(), "first".to_string()]
    );
}

#[test]
fn test_second_load_finds_save_register_empty() {
    let mut writer = ImageWriter::new();
    let scene = writer.add_string("saver");
    let mut asm = Asm::new();
    // Load the (empty) save register and hand it to the host as text;
    // Undefined coerces to the literal string "undefined".
    asm.push_int(9)
        .save()
        .pop()
        .load()
        .pop()
        .load()
        .text_run()
        .exit();
    writer.set_instructions(asm.finish());
    writer.add_scene(scene, 0, vec![]);

    let mut vm = Interpreter::new(Image::from_bytes(&writer.to_bytes()).unwrap());
    let capture = Capture::new();
    capture.install(&mut vm);
    vm.run_scene("saver").unwrap();
    assert_eq!(capture.last_text(), "undefined");
}
