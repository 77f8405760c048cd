#![forbid(unsafe_code)]

fn main() {
    if let Err(error) = isynth::run_from_env() {
        if std::env::var_os("ISYNTH_ERROR_JSON").is_some() {
            eprintln!(
                "{}",
                serde_json::json!({
                    "status": "error",
                    "error": error.to_string(),
                    "exit_code": error.exit_code(),
                })
            );
        } else {
            eprintln!("inputsynth: {error}");
        }
        std::process::exit(error.exit_code());
    }
}
