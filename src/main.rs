// fable - Terminal player for compiled dialogue images
// Copyright (c) 2025 Tom Waddington. MIT licensed.

use std::cell::RefCell;
use std::env;
use std::io::{self, BufRead, Write};
use std::process;
use std::rc::Rc;

use fable_embed::{Engine, State};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();

    // Handle --version flag
    if args.len() == 2 && (args[1] == "--version" || args[1] == "-v") {
        println!("Fable v0.1.0");
        return;
    }

    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: fable <image.dxb> [scene]");
        eprintln!("       fable <image.dxb> --list");
        process::exit(2);
    }

    let mut engine = match Engine::from_file(&args[1]) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if args.get(2).map(String::as_str) == Some("--list") {
        for name in engine.scene_names() {
            println!("{}", name);
        }
        return;
    }

    let scene = match args.get(2) {
        Some(name) => name.clone(),
        None => match engine.scene_names().first() {
            Some(name) => name.clone(),
            None => {
                eprintln!("Error: image contains no scenes");
                process::exit(1);
            }
        },
    };

    if let Err(e) = play(&mut engine, &scene) {
        eprintln!("{}", e);
        process::exit(1);
    }
}

/// Run one scene to completion, reading choice selections from stdin.
fn play(engine: &mut Engine, scene: &str) -> Result<(), fable_embed::Error> {
    let pending_choices: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let choices = Rc::clone(&pending_choices);

    engine.text_handler(|text| println!("{}", text));
    engine.choice_handler(move |options| {
        *choices.borrow_mut() = options;
    });
    engine.end_scene_handler(|name| println!("-- end of {} --", name));

    engine.initialize_flags()?;
    engine.run_scene(scene)?;

    let stdin = io::stdin();
    loop {
        match engine.state() {
            State::InText => {
                // Wait for Enter before the next line.
                let mut line = String::new();
                let _ = stdin.lock().read_line(&mut line);
                engine.resume_scene()?;
            }
            State::InChoice => {
                let options = pending_choices.borrow().clone();
                for (i, option) in options.iter().enumerate() {
                    println!("  {}. {}", i + 1, option);
                }
                let index = loop {
                    prompt("> ");
                    let mut line = String::new();
                    if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
                        return Ok(());
                    }
                    match line.trim().parse::<usize>() {
                        Ok(n) if n >= 1 && n <= options.len() => break n - 1,
                        _ => println!("Pick a number between 1 and {}", options.len()),
                    }
                };
                engine.select_choice(index)?;
            }
            _ => return Ok(()),
        }
    }
}

fn prompt(text: &str) {
    print!("{}", text);
    let _ = io::stdout().flush();
}
