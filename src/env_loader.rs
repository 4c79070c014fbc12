use std::env;
use std::path::PathBuf;

fn fallback_dotenv_path(letta_home: Option<PathBuf>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    match letta_home {
        Some(custom) => Some(custom.join(".env")),
        None => Some(home_dir?.join(".letta/.env")),
    }
}

/// `.env` in the working directory, else the one in the Letta home. Variables
/// already set in the process environment are never overwritten.
pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("LETTA_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from),
        dirs::home_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}
