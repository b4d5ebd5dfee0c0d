use std::{env, fs, path::Path, process::ExitCode, time::Instant};

use casebook::{Context, Interpreter, RawSource, StdTrace, Task, parse_tree_from_json};

// Options; diagnostics go to stdout, so debug narration is off by default.
const DEBUG_MODE: bool = false;
const CONTINUE_ON_EXCEPTION: bool = false;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        println!("usage: casebook <grammar-file> <source-file>");
        println!("the external parser must have exported <source-file>.tree.json");
        return ExitCode::FAILURE;
    }
    let grammar_path = &args[1];
    let source_path = &args[2];

    // The grammar drives the external parser; here it is only checked for
    // presence so a bad invocation fails before any work happens.
    if let Err(err) = read_file(grammar_path) {
        println!("error: {err}");
        return ExitCode::FAILURE;
    }
    let source_text = match read_file(source_path) {
        Ok(text) => text,
        Err(err) => {
            println!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let tree_path = format!("{source_path}.tree.json");
    let tree_json = match read_file(&tree_path) {
        Ok(text) => text,
        Err(err) => {
            println!("error: {err}");
            println!("(run the external parser over the source file to export its parse tree)");
            return ExitCode::FAILURE;
        }
    };

    let raw_source = RawSource {
        path: source_path.clone(),
        text: source_text,
    };
    let context = Context {
        debug_mode: DEBUG_MODE,
        continue_on_exception: CONTINUE_ON_EXCEPTION,
        ..Context::default()
    };

    let start = Instant::now();
    let tree = match parse_tree_from_json(&tree_json) {
        Ok(tree) => tree,
        Err(err) => {
            println!("{}", err.render(Some(&raw_source)));
            return ExitCode::FAILURE;
        }
    };
    let mut interp = match Interpreter::from_parse_tree(context, &tree, Some(raw_source.clone()), &mut StdTrace) {
        Ok(interp) => interp,
        Err(err) => {
            println!("{}", err.render(Some(&raw_source)));
            return ExitCode::FAILURE;
        }
    };

    match interp.task_render_run(Task::latex(), &mut StdTrace) {
        Ok(task) => {
            let elapsed = start.elapsed();
            let doc = task.renderer.expect("completed task carries a render document");
            println!(
                "task '{}' complete after {elapsed:?}: {} entries rendered",
                task.task_id,
                doc.entry_count()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            let elapsed = start.elapsed();
            println!("error after {elapsed:?}:");
            println!("{}", err.render(Some(&raw_source)));
            ExitCode::FAILURE
        }
    }
}

fn read_file(file_path: &str) -> Result<String, String> {
    let path = Path::new(file_path);
    match fs::metadata(path) {
        Ok(metadata) => {
            if !metadata.is_file() {
                return Err(format!("{file_path} is not a file"));
            }
        }
        Err(err) => {
            return Err(format!("could not read {file_path}: {err}"));
        }
    }
    fs::read_to_string(path).map_err(|err| format!("could not read {file_path}: {err}"))
}
