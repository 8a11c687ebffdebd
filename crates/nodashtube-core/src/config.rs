use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// External downloader invocation. The source id is appended as the last argument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Program to run (looked up in `PATH` if not absolute).
    pub program: String,
    /// Arguments placed before the source id.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            program: "youtube-dl".to_string(),
            args: Vec::new(),
        }
    }
}

/// Global configuration loaded from `~/.config/nodashtube/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NdtConfig {
    /// Where downloads are written. Defaults to `<tmp>/nodashtube`.
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Control socket path. Defaults to `$XDG_STATE_HOME/nodashtube/control.sock`.
    #[serde(default)]
    pub control_socket: Option<PathBuf>,
    #[serde(default)]
    pub downloader: DownloaderConfig,
}

impl NdtConfig {
    /// Download directory: explicit override, then config, then `<tmp>/nodashtube`.
    pub fn download_dir(&self, override_dir: Option<&Path>) -> PathBuf {
        override_dir
            .map(Path::to_path_buf)
            .or_else(|| self.download_dir.clone())
            .unwrap_or_else(|| std::env::temp_dir().join("nodashtube"))
    }

    /// Control socket: explicit override, then config, then the XDG state dir.
    pub fn control_socket(&self, override_path: Option<&Path>) -> Result<PathBuf> {
        if let Some(p) = override_path.map(Path::to_path_buf).or_else(|| self.control_socket.clone()) {
            return Ok(p);
        }
        default_control_socket_path()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("nodashtube")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Default path for the control socket (XDG state dir, next to the log).
pub fn default_control_socket_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("nodashtube")?;
    Ok(xdg_dirs.get_state_home().join("nodashtube").join("control.sock"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<NdtConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

pub fn load_or_init_at(path: &Path) -> Result<NdtConfig> {
    if !path.exists() {
        let default_cfg = NdtConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)
            .with_context(|| format!("failed to write default config: {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let cfg: NdtConfig =
        toml::from_str(&data).with_context(|| format!("invalid config: {}", path.display()))?;
    Ok(cfg)
}

/// Create the download directory. The whole service depends on it, so a
/// failure here should stop startup.
pub fn ensure_download_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("could not create download dir {}", dir.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = NdtConfig::default();
        assert!(cfg.download_dir.is_none());
        assert!(cfg.control_socket.is_none());
        assert_eq!(cfg.downloader.program, "youtube-dl");
        assert!(cfg.downloader.args.is_empty());
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            download_dir = "/srv/videos"

            [downloader]
            program = "yt-dlp"
            args = ["--newline", "-f", "best"]
        "#;
        let cfg: NdtConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.download_dir.as_deref(), Some(Path::new("/srv/videos")));
        assert_eq!(cfg.downloader.program, "yt-dlp");
        assert_eq!(cfg.downloader.args, vec!["--newline", "-f", "best"]);
    }

    #[test]
    fn empty_toml_is_default() {
        let cfg: NdtConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.downloader.program, "youtube-dl");
        assert!(cfg.download_dir.is_none());
    }

    #[test]
    fn download_dir_precedence() {
        let mut cfg = NdtConfig::default();
        assert_eq!(cfg.download_dir(None), std::env::temp_dir().join("nodashtube"));
        cfg.download_dir = Some(PathBuf::from("/from/config"));
        assert_eq!(cfg.download_dir(None), PathBuf::from("/from/config"));
        assert_eq!(
            cfg.download_dir(Some(Path::new("/from/flag"))),
            PathBuf::from("/from/flag")
        );
    }

    #[test]
    fn control_socket_override_wins() {
        let cfg = NdtConfig {
            control_socket: Some(PathBuf::from("/run/ndt.sock")),
            ..Default::default()
        };
        assert_eq!(cfg.control_socket(None).unwrap(), PathBuf::from("/run/ndt.sock"));
        assert_eq!(
            cfg.control_socket(Some(Path::new("/tmp/other.sock"))).unwrap(),
            PathBuf::from("/tmp/other.sock")
        );
    }

    #[test]
    fn load_or_init_writes_default_then_reads_it() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = load_or_init_at(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.downloader.program, "youtube-dl");

        fs::write(&path, "[downloader]\nprogram = \"yt-dlp\"\n").unwrap();
        let cfg = load_or_init_at(&path).unwrap();
        assert_eq!(cfg.downloader.program, "yt-dlp");
    }

    #[test]
    fn ensure_download_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b");
        ensure_download_dir(&target).unwrap();
        assert!(target.is_dir());
    }
}
