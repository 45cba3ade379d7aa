//! refl dictionary compiler CLI.

use std::path::{Path, PathBuf};

use reflc::commands::{check_selection, explain_error, generate_dictionary};
use reflc::{init_tracing, DictOptions};
use refl_select::SelectionFileKind;

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let command = &args[1];

    let code = match command.as_str() {
        "generate" | "check" => {
            let options = match parse_dict_options(&args[2..]) {
                Ok(options) => options,
                Err(message) => {
                    eprintln!("error: {message}");
                    eprintln!();
                    eprintln!("Usage: reflc {command} -f <dict.cxx> -u <decls.json> [options] <headers...> [LinkDef.h|selection.xml]");
                    eprintln!("Run `reflc help` for the list of options.");
                    std::process::exit(1);
                }
            };
            init_tracing(options.verbosity);
            if command == "generate" {
                generate_dictionary(&options)
            } else {
                check_selection(&options)
            }
        }
        "--explain" | "explain" => {
            if args.len() < 3 {
                eprintln!("Usage: reflc explain <ERROR_CODE>");
                eprintln!("Example: reflc explain E2005");
                std::process::exit(1);
            }
            explain_error(&args[2])
        }
        "help" | "--help" | "-h" => {
            print_usage();
            0
        }
        "version" | "--version" => {
            println!("reflc {}", env!("CARGO_PKG_VERSION"));
            0
        }
        _ => {
            eprintln!("Unknown command: {command}");
            eprintln!();
            print_usage();
            1
        }
    };
    std::process::exit(code);
}

/// Options of `generate` and `check`.
///
/// Positional arguments are headers, except one recognized as a
/// selection file (`*LinkDef*.h` or `*.xml`).
fn parse_dict_options(args: &[String]) -> Result<DictOptions, String> {
    let mut options = DictOptions::default();
    let mut dict_file = None;
    let mut universe = None;

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        let mut value = |name: &str| -> Result<String, String> {
            i += 1;
            args.get(i)
                .cloned()
                .ok_or_else(|| format!("`{name}` expects a value"))
        };
        match arg {
            "-f" => dict_file = Some(PathBuf::from(value("-f")?)),
            "-u" | "--universe" => universe = Some(PathBuf::from(value(arg)?)),
            "-s" => options.shared_library = Some(PathBuf::from(value("-s")?)),
            "-rmf" => options.rootmap_file = Some(PathBuf::from(value("-rmf")?)),
            "-rml" => options.rootmap_libs.push(value("-rml")?),
            "-I" => options.include_paths.push(value("-I")?),
            "--legacy-rootmap" => options.legacy_rootmap = true,
            "--split" => options.split = true,
            "--inline-headers" => options.inline_headers = true,
            "--fail-on-warnings" => options.fail_on_warnings = true,
            "--selection-syntax-only" => options.selection_syntax_only = true,
            "-v" | "--verbose" => options.verbosity = options.verbosity.saturating_add(1),
            "-vv" => options.verbosity = options.verbosity.saturating_add(2),
            "-vvv" => options.verbosity = options.verbosity.saturating_add(3),
            _ => {
                if let Some(prefix) = arg.strip_prefix("--lib-list-prefix=") {
                    options.lib_list_prefix = Some(prefix.to_string());
                } else if let Some(path) = arg.strip_prefix("-I").filter(|p| !p.is_empty()) {
                    options.include_paths.push(path.to_string());
                } else if arg.starts_with('-') {
                    return Err(format!("unknown option `{arg}`"));
                } else if SelectionFileKind::detect(Path::new(arg)).is_ok() {
                    if options.selection_file.is_some() {
                        return Err(format!("second selection file `{arg}`"));
                    }
                    options.selection_file = Some(PathBuf::from(arg));
                } else {
                    options.headers.push(arg.to_string());
                }
            }
        }
        i += 1;
    }

    options.dict_file = dict_file.ok_or("missing dictionary file (-f)")?;
    options.universe = universe.ok_or("missing declaration dump (-u)")?;
    Ok(options)
}

fn print_usage() {
    println!("refl dictionary compiler");
    println!();
    println!("Usage: reflc <command> [options]");
    println!();
    println!("Commands:");
    println!("  generate             Generate a dictionary source and its metadata");
    println!("  check                Select and generate in memory; write nothing");
    println!("  explain <code>       Explain an error code (e.g., E2005)");
    println!("  help                 Show this help message");
    println!("  version              Show version information");
    println!();
    println!("Dictionary options:");
    println!("  -f <dict.cxx>               Generated source");
    println!("  -u <decls.json>             Declaration dump of the input headers");
    println!("  -I <dir>                    Include path recorded in the module");
    println!("  -s <libFoo.so>              Shared library; names the index file");
    println!("  -rmf <file.rootmap>         Index file");
    println!("  -rml <library>              Library listed in the index (repeatable)");
    println!("  --legacy-rootmap            Write the index in the one-line-per-key format");
    println!("  --split                     Put class code in <dict>_classdef.cxx");
    println!("  --inline-headers            Point the header map at the inline payload");
    println!("  --lib-list-prefix=<prefix>  Read <prefix>.in, write <prefix>.out");
    println!("  --fail-on-warnings          Treat warnings as errors");
    println!("  --selection-syntax-only     Check the selection file and stop");
    println!("  -v, -vv, -vvv               Log at info, debug or trace level");
    println!();
    println!("Examples:");
    println!("  reflc generate -f EventDict.cxx -u Event.json -s libEvent.so Event.h LinkDef.h");
    println!("  reflc check -f EventDict.cxx -u Event.json Event.h selection.xml");
    println!("  reflc explain E1001");
}
