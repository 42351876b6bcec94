/// Stage Preview — interactive shell for trying a variable configuration.
///
/// Usage: stage_preview --variables <path> --keywords <path> [--seed <n>] [--precision <n>]
///
/// Commands:
///   text <narrative>     — run one update cycle over all variables
///   pre <narrative>      — update only pre_update variables
///   post <narrative>     — update only post-update variables
///   stages               — show every stage descriptor
///   values               — show every value
///   info <name>          — show one variable as JSON
///   set <name> <value>   — overwrite a value (rounded and clamped)
///   save / load          — keep or restore an in-memory snapshot
///   seed <n>             — restart the RNG
///   help                 — list commands
///   quit                 — exit

use narrative_state::core::engine::{Outcome, UpdatePhase, UpdateRecord, VariableEngine};
use narrative_state::core::store::ValueSnapshot;
use std::io::{self, BufRead, Write};

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut variables_path = None;
    let mut keywords_path = None;
    let mut seed: u64 = 42;
    let mut precision = Some(1);

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--variables" if i + 1 < args.len() => {
                i += 1;
                variables_path = Some(args[i].clone());
            }
            "--keywords" if i + 1 < args.len() => {
                i += 1;
                keywords_path = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().unwrap_or(42);
            }
            "--precision" if i + 1 < args.len() => {
                i += 1;
                precision = match args[i].as_str() {
                    "none" | "full" => None,
                    n => n.parse().ok(),
                };
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let (Some(variables_path), Some(keywords_path)) = (variables_path, keywords_path) else {
        eprintln!("Both --variables and --keywords are required");
        print_usage();
        std::process::exit(1);
    };

    let mut engine = match VariableEngine::builder()
        .seed(seed)
        .value_precision(precision)
        .variables_path(&variables_path)
        .keywords_path(&keywords_path)
        .build()
    {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    println!("Loaded {} variables", engine.store().len());
    println!("Seed: {}", seed);
    println!("Type 'help' for commands.\n");

    let mut saved: Option<ValueSnapshot> = None;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("stages> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd.to_lowercase(), rest.trim()),
            None => (line.to_lowercase(), ""),
        };

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
            }
            "text" | "pre" | "post" => {
                let phase = match cmd.as_str() {
                    "pre" => UpdatePhase::Pre,
                    "post" => UpdatePhase::Post,
                    _ => UpdatePhase::All,
                };
                match engine.update_phase(rest, phase) {
                    Ok(records) => print_records(&records),
                    Err(e) => println!("Error: {}", e),
                }
            }
            "stages" => {
                let report = engine.stage_report();
                if report.is_empty() {
                    println!("No staged variables.");
                }
                for entry in report {
                    println!(
                        "  {} ({}): {} -> {}",
                        entry.label,
                        entry.variable,
                        entry.descriptor.relative_value,
                        entry.descriptor.relative_current_description
                    );
                }
            }
            "values" => {
                for var in engine.store().iter() {
                    println!(
                        "  {:<20} {:>10} [{}, {}]",
                        var.name,
                        var.current_value(),
                        var.min_value,
                        var.max_value
                    );
                }
            }
            "info" => match engine.store().info(rest) {
                Ok(info) => match serde_json::to_string_pretty(&info) {
                    Ok(json) => println!("{}", json),
                    Err(e) => println!("Error: {}", e),
                },
                Err(e) => println!("Error: {}", e),
            },
            "set" => {
                let parts: Vec<&str> = rest.split_whitespace().collect();
                let value = parts.get(1).and_then(|v| v.parse::<f64>().ok());
                match (parts.first(), value) {
                    (Some(name), Some(value)) => {
                        let mut snapshot = engine.snapshot();
                        if let Some(slot) = snapshot.values.get_mut(*name) {
                            *slot = value;
                            match engine.restore(&snapshot) {
                                Ok(()) => println!("{} = {}", name, engine.value(name).unwrap_or(value)),
                                Err(e) => println!("Error: {}", e),
                            }
                        } else {
                            println!("Unknown variable: {}", name);
                        }
                    }
                    _ => println!("Usage: set <name> <value>"),
                }
            }
            "save" => {
                let snapshot = engine.snapshot();
                if let Ok(json) = serde_json::to_string(&snapshot) {
                    println!("{}", json);
                }
                saved = Some(snapshot);
            }
            "load" => match saved {
                Some(ref snapshot) => match engine.restore(snapshot) {
                    Ok(()) => println!("Snapshot restored."),
                    Err(e) => println!("Error: {}", e),
                },
                None => println!("Nothing saved yet."),
            },
            "seed" => match rest.parse::<u64>() {
                Ok(n) => {
                    engine.reseed(n);
                    println!("Seed set to {}", n);
                }
                Err(_) => println!("Usage: seed <n>"),
            },
            _ => {
                println!("Unknown command: '{}'. Type 'help' for commands.", cmd);
            }
        }
    }
}

fn print_records(records: &[UpdateRecord]) {
    for record in records {
        let what = match record.outcome {
            Outcome::Reset => "reset".to_string(),
            Outcome::Updated { delta } => format!("{:+}", delta),
            Outcome::NoOp(reason) => format!("no-op ({:?})", reason),
        };
        let mut line = format!(
            "  {:<20} {:>8} -> {:<8} {}",
            record.variable, record.previous_value, record.value, what
        );
        if record.clamped {
            line.push_str(" [clamped]");
        }
        if let Some(ref t) = record.transition {
            line.push_str(&format!(" stage {} -> {}", t.from, t.to));
        }
        println!("{}", line);
    }
}

fn print_usage() {
    println!("Usage: stage_preview --variables <path> --keywords <path> [--seed <n>] [--precision <n|none>]");
}

fn print_help() {
    println!("Commands:");
    println!("  text <narrative>     Run one update cycle over all variables");
    println!("  pre <narrative>      Update only pre_update variables");
    println!("  post <narrative>     Update only post-update variables");
    println!("  stages               Show every stage descriptor");
    println!("  values               Show every value");
    println!("  info <name>          Show one variable as JSON");
    println!("  set <name> <value>   Overwrite a value");
    println!("  save                 Keep a snapshot in memory");
    println!("  load                 Restore the saved snapshot");
    println!("  seed <n>             Restart the RNG");
    println!("  help                 Show this message");
    println!("  quit                 Exit");
}
