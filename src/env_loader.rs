use std::env;
use std::path::PathBuf;

fn fallback_dotenv_path(archiver_home: Option<PathBuf>, config_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(home) = archiver_home {
        return Some(home.join(".env"));
    }
    Some(config_dir?.join("category-archiver/.env"))
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("ARCHIVER_HOME").map(PathBuf::from),
        dirs::config_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}
