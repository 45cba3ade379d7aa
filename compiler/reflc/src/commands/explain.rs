//! The `explain` command: display documentation for an error code.

use refl_diagnostic::{ErrorCode, ErrorDocs};

pub fn explain_error(code_str: &str) -> i32 {
    let Some(code) = ErrorCode::ALL
        .iter()
        .copied()
        .find(|code| code.as_str().eq_ignore_ascii_case(code_str))
    else {
        eprintln!("Unknown error code: {code_str}");
        eprintln!();
        eprintln!("Codes have the format EXXXX where X is a digit.");
        eprintln!("Examples: E0001, E1001, E2005, E9001");
        return 1;
    };

    if let Some(doc) = ErrorDocs::get(code) {
        println!("{doc}");
        0
    } else {
        eprintln!("No documentation available for {code_str}");
        1
    }
}
