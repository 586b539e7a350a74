use std::error::Error;

use crate::cli::SnippetAction;
use crate::commands::format_snippet_list;
use crate::core::config::{path_display, Config};
use crate::core::snippets::SnippetStore;
use crate::core::storage::FileKeyValueStore;

pub fn run(action: Option<SnippetAction>) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let data_dir = config.data_dir()?;
    let mut store = SnippetStore::load(Box::new(FileKeyValueStore::new(&data_dir)));

    match action {
        None => {
            println!("Saved snippets ({}):\n", path_display(&data_dir));
            println!("{}", format_snippet_list(store.list()));
        }
        Some(SnippetAction::Show { id }) => match store.get(&id) {
            Some(snippet) => {
                println!("# {} [{}]", snippet.title, snippet.language);
                println!("{}", snippet.code);
            }
            None => return Err(format!("No snippet with id {id}").into()),
        },
        Some(SnippetAction::Delete { id }) => {
            if store.delete(&id)? {
                println!("✅ Deleted snippet {id}");
            } else {
                return Err(format!("No snippet with id {id}").into());
            }
        }
    }
    Ok(())
}
