use super::{json_pretty, EXIT_SUCCESS};
use bento_schema::EnvName;
use bento_store::{read_record, BundlingRootResolver};

/// Print the persisted install record of one environment.
pub fn run(name: &str, json: bool) -> Result<u8, String> {
    let root = BundlingRootResolver::new()
        .root()
        .map_err(|e| e.to_string())?;
    let environment_root = root.environment_root(&EnvName::new(name));

    let record = read_record(&environment_root)
        .ok_or_else(|| format!("no install record for environment '{name}'"))?;

    if json {
        println!("{}", json_pretty(&record)?);
    } else {
        println!("environment:    {name}");
        println!("path:           {}", environment_root.display());
        println!("outcome:        {}", record.outcome);
        println!("source version: {}", record.source_version);
        println!("created at:     {}", record.created_at);
        println!("creation path:  {}", record.creation_path.display());
    }
    Ok(EXIT_SUCCESS)
}
