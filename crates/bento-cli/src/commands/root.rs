use super::{EXIT_CONFIG_ERROR, EXIT_SUCCESS};
use bento_store::BundlingRootResolver;

/// Print the resolved bundling root.
pub fn run() -> Result<u8, String> {
    match BundlingRootResolver::new().root() {
        Ok(root) => {
            println!("{}", root.path().display());
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {e}");
            Ok(EXIT_CONFIG_ERROR)
        }
    }
}
