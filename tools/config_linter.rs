/// Config Linter — validates a variables document and keyword document.
///
/// Usage: config_linter <variables_file> <keywords_file>
///
/// Files ending in `.ron` are read as RON, everything else as JSON.

use narrative_state::core::config::EngineConfig;
use narrative_state::schema::variable::{ResetType, UpdateType, Variable};
use std::collections::HashMap;
use std::path::Path;
use std::process;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: config_linter <variables_file> <keywords_file>");
        process::exit(0);
    }

    let variables_path = Path::new(&args[1]);
    let keywords_path = Path::new(&args[2]);

    let config = match EngineConfig::load(variables_path, keywords_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ERROR: Failed to load config: {}", e);
            process::exit(1);
        }
    };

    println!(
        "Loaded {} variable records and {} keyword sections",
        config.variables.len(),
        config.keywords.len()
    );

    println!("\n=== Config Lint Report ===\n");

    let variables = match config.validate() {
        Ok(variables) => variables,
        Err(e) => {
            println!("ERROR: {}", e);
            println!("\nSummary: 1 error, 0 warnings");
            process::exit(1);
        }
    };

    let warnings = lint_variables(&variables);

    if warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    println!("\nSummary: 0 errors, {} warnings", warnings.len());
}

fn lint_variables(variables: &[Variable]) -> Vec<String> {
    let mut warnings = Vec::new();

    for var in variables {
        match var.update_type {
            UpdateType::LlmFuzzy => {
                if !var.keyword_groups.is_empty() {
                    warnings.push(format!(
                        "Variable '{}' is llm_fuzzy; its {} keyword groups are never used",
                        var.name,
                        var.keyword_groups.len()
                    ));
                }
            }
            UpdateType::KeywordCount | UpdateType::KeywordAppear => {
                if var.keyword_groups.is_empty() {
                    warnings.push(format!(
                        "Variable '{}' is updated by keywords but has no keyword groups",
                        var.name
                    ));
                }
            }
        }

        if var.reset_type == ResetType::Llm {
            warnings.push(format!(
                "Variable '{}' resets via llm; resets are left to the caller",
                var.name
            ));
        }

        // A keyword listed in two groups draws twice per occurrence.
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for group in &var.keyword_groups {
            if group.is_fixed() && group.min_value == 0.0 {
                warnings.push(format!(
                    "Variable '{}': group '{}' always draws 0",
                    var.name, group.name
                ));
            }
            for keyword in &group.keywords {
                if let Some(first) = owners.insert(keyword.as_str(), group.name.as_str()) {
                    if first != group.name {
                        warnings.push(format!(
                            "Variable '{}': keyword '{}' appears in groups '{}' and '{}'",
                            var.name, keyword, first, group.name
                        ));
                    }
                }
            }
        }

        for keyword in &var.reset_keywords {
            if owners.contains_key(keyword.as_str()) {
                warnings.push(format!(
                    "Variable '{}': reset keyword '{}' is also an update keyword; the reset always wins",
                    var.name, keyword
                ));
            }
        }

        if var.stage.is_some() && (var.min_value.is_infinite() || var.max_value.is_infinite()) {
            warnings.push(format!(
                "Variable '{}' has stages but unbounded range [{}, {}]",
                var.name, var.min_value, var.max_value
            ));
        }
    }

    warnings
}
