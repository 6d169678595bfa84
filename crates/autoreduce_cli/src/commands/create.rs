//! Create command implementation.

use super::CommandResult;
use autoreduce_core::{AutoMapReduceIndex, AutoMapReduceIndexDefinition, IndexConfig, IndexField};
use autoreduce_storage::Environment;
use std::path::Path;
use std::sync::Arc;

/// Fields of a new index, as given on the command line.
#[derive(Debug, Default)]
pub struct CreateArgs {
    /// Index name.
    pub name: String,
    /// Source collection.
    pub collection: String,
    /// Group-by paths.
    pub group_by: Vec<String>,
    /// Summed paths.
    pub sum: Vec<String>,
    /// Count field names.
    pub count: Vec<String>,
}

/// Builds the definition described by `args`.
pub fn definition(args: &CreateArgs) -> CommandResult<AutoMapReduceIndexDefinition> {
    let mut definition = AutoMapReduceIndexDefinition::new(&args.name, &args.collection);
    for path in &args.sum {
        definition = definition.with_map_field(IndexField::sum(path)?);
    }
    for name in &args.count {
        definition = definition.with_map_field(IndexField::count(name)?);
    }
    for path in &args.group_by {
        definition = definition.with_group_by(IndexField::group_by(path)?);
    }
    Ok(definition)
}

/// Runs the create command.
pub fn run(path: &Path, args: &CreateArgs) -> CommandResult {
    let env = Arc::new(Environment::open_dir(path)?);
    let index = AutoMapReduceIndex::create_new(env, definition(args)?, IndexConfig::default())?;
    println!("created index '{}'", index.name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_from_args() {
        let args = CreateArgs {
            name: "orders".into(),
            collection: "Orders".into(),
            group_by: vec!["Category".into()],
            sum: vec!["Price".into()],
            count: vec!["Count".into()],
        };
        let definition = definition(&args).unwrap();
        assert_eq!(definition.map_fields().len(), 2);
        assert_eq!(definition.group_by_fields()[0].name(), "Category");
    }

    #[test]
    fn create_then_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let args = CreateArgs {
            name: "orders".into(),
            collection: "Orders".into(),
            group_by: vec!["Category".into()],
            ..CreateArgs::default()
        };
        run(dir.path(), &args).unwrap();
        assert!(run(dir.path(), &args).is_err());
        assert!(super::super::open_index(dir.path(), "orders").is_ok());
    }
}
