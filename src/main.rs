//! kubeforge CLI binary.
//!
//! Minimal entrypoint; all logic is in the library. main only maps the
//! result of `cli::run()` to a process exit code.

#[tokio::main]
async fn main() {
    if let Err(code) = kubeforge::cli::run().await {
        std::process::exit(code.as_i32());
    }
}
