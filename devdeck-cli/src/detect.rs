//! Detect the frontend/backend layout of an existing folder for import

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use devdeck_core::lifecycle::ImportRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedProject {
    pub root: PathBuf,
    pub project_name: String,
    pub has_frontend: bool,
    pub has_backend: bool,
    pub frontend_port: Option<u16>,
    pub backend_port: Option<u16>,
}

impl DetectedProject {
    pub fn into_request(self, name: Option<String>, description: String) -> ImportRequest {
        ImportRequest {
            name: name.unwrap_or(self.project_name),
            description,
            root: self.root,
            has_frontend: self.has_frontend,
            has_backend: self.has_backend,
            frontend_port: self.frontend_port,
            backend_port: self.backend_port,
        }
    }
}

/// `frontend/package.json` marks a frontend; `backend/requirements.txt` or
/// `backend/main.py` marks a backend.
pub fn detect_project(root: &Path) -> Result<DetectedProject> {
    if !root.exists() {
        bail!("path does not exist: {}", root.display());
    }

    let frontend = root.join("frontend");
    let backend = root.join("backend");

    let has_frontend = frontend.join("package.json").exists();
    let has_backend = backend.join("requirements.txt").exists() || backend.join("main.py").exists();

    let frontend_port = if has_frontend {
        ["vite.config.ts", "vite.config.js"]
            .iter()
            .find_map(|name| port_in_file(&frontend.join(name)))
    } else {
        None
    };
    let backend_port = if has_backend {
        port_in_file(&backend.join(".env"))
    } else {
        None
    };

    let project_name = root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("Unknown")
        .to_string();

    Ok(DetectedProject {
        root: root.to_path_buf(),
        project_name,
        has_frontend,
        has_backend,
        frontend_port,
        backend_port,
    })
}

fn port_in_file(path: &Path) -> Option<u16> {
    let content = fs::read_to_string(path).ok()?;
    extract_port(&content)
}

/// First number in 1024..=65535 on a line that mentions `port`/`PORT`
pub fn extract_port(content: &str) -> Option<u16> {
    content
        .lines()
        .filter(|line| line.contains("port") || line.contains("PORT"))
        .flat_map(|line| line.split(|c: char| !c.is_ascii_digit()))
        .filter_map(|word| word.parse::<u16>().ok())
        .find(|port| *port >= 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_port() {
        assert_eq!(extract_port("    port: 5180,\n"), Some(5180));
        assert_eq!(extract_port("BACKEND_PORT=8010"), Some(8010));
        assert_eq!(extract_port("port: 80\nhost: x"), None);
        assert_eq!(extract_port("server: 3000"), None);
        assert_eq!(extract_port("PORT=99999 or 4000"), Some(4000));
    }

    #[test]
    fn test_detect_full_layout() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("shop");
        fs::create_dir_all(root.join("frontend")).unwrap();
        fs::create_dir_all(root.join("backend")).unwrap();
        fs::write(root.join("frontend/package.json"), "{}").unwrap();
        fs::write(
            root.join("frontend/vite.config.js"),
            "export default { server: { port: 5199 } }",
        )
        .unwrap();
        fs::write(root.join("backend/main.py"), "").unwrap();
        fs::write(root.join("backend/.env"), "BACKEND_PORT=8042\n").unwrap();

        let detected = detect_project(&root).unwrap();
        assert_eq!(detected.project_name, "shop");
        assert!(detected.has_frontend && detected.has_backend);
        assert_eq!(detected.frontend_port, Some(5199));
        assert_eq!(detected.backend_port, Some(8042));

        let request = detected.into_request(Some("Shop".into()), String::new());
        assert_eq!(request.name, "Shop");
        assert_eq!(request.root, root);
    }

    #[test]
    fn test_detect_backend_only_without_ports() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("backend")).unwrap();
        fs::write(dir.path().join("backend/requirements.txt"), "fastapi\n").unwrap();

        let detected = detect_project(dir.path()).unwrap();
        assert!(!detected.has_frontend);
        assert!(detected.has_backend);
        assert_eq!(detected.frontend_port, None);
        assert_eq!(detected.backend_port, None);
    }

    #[test]
    fn test_detect_missing_path() {
        assert!(detect_project(Path::new("/no/such/project/here")).is_err());
    }
}
