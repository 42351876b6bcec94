/// Dating Sim demo — a week of story beats driving affection, stamina and time.
///
/// Each beat is split into the pre-update pass (before the beat would be
/// generated) and the post-update pass (after). Stage descriptors are
/// printed the way they would be injected into the next prompt.
///
/// Run with: cargo run --example dating_sim

use narrative_state::core::engine::{Outcome, UpdatePhase, VariableEngine};
use std::path::Path;

fn main() {
    let mut engine = VariableEngine::builder()
        .seed(2026)
        .variables_path(Path::new("demo_data/dating_sim/variables.json"))
        .keywords_path(Path::new("demo_data/dating_sim/keywords.json"))
        .build()
        .expect("Failed to build engine");

    let beats = [
        "We talked by the river. She smiled when I walked her home.",
        "I ran to the station and climbed the stairs, then we chatted over dinner.",
        "She laughed at my joke and we went to a movie. Then she mentioned another guy.",
        "I ignored her message and slept until noon.",
        "I brought a gift, she smiled and laughed, and we talked for hours over dinner.",
        "Under the lanterns I finally said it: I love you.",
    ];

    let initial = engine.snapshot();

    for (i, beat) in beats.iter().enumerate() {
        println!("=== Beat {} ===", i + 1);
        print_prompt_context(&engine);
        println!("> {}", beat);

        for phase in [UpdatePhase::Pre, UpdatePhase::Post] {
            let records = engine.update_phase(beat, phase).expect("Update failed");
            for record in records.iter().filter(|r| r.changed()) {
                let what = match record.outcome {
                    Outcome::Reset => "reset".to_string(),
                    Outcome::Updated { delta } => format!("{:+}", delta),
                    Outcome::NoOp(_) => continue,
                };
                print!("  {:?} {}: {} -> {} ({})", phase, record.variable, record.previous_value, record.value, what);
                if let Some(ref t) = record.transition {
                    print!(" stage {} -> {}", t.from, t.to);
                }
                println!();
            }
        }
        println!();
    }

    println!("=== Final state ===");
    print_prompt_context(&engine);

    engine.restore(&initial).expect("Failed to restore snapshot");
    println!("\nRestored initial snapshot; affection = {}", engine.value("affection").unwrap_or_default());
}

fn print_prompt_context(engine: &VariableEngine) {
    for entry in engine.stage_report() {
        println!("  [{}] {}", entry.label, entry.descriptor.relative_current_description);
    }
    for var in engine.store().iter().filter(|v| v.stage.is_none()) {
        println!("  [{}] {}", var.name, var.current_value());
    }
}
