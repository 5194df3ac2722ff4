//! Runtime detection and Dockerfile synthesis.
//!
//! [`detect`] walks a project's working directory top-down, ordered probe
//! by probe, and stops at the first match. [`synthesize_dockerfile`] then
//! turns that detection into a reproducible, minimal-base-image Dockerfile
//! when the project doesn't already ship one — using exec-form `CMD` with
//! the start command tokenized into separate array elements, since a
//! single shell-string argument breaks on any multi-word start command
//! (`npm run start`, `pipenv run python app.py`).

use std::path::Path;

use dockyard_types::Runtime;

/// Package manager selected by lockfile presence, for Node.js projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Npm,
    Pnpm,
    Yarn,
    Bun,
}

impl PackageManager {
    fn binary(self) -> &'static str {
        match self {
            PackageManager::Npm => "npm",
            PackageManager::Pnpm => "pnpm",
            PackageManager::Yarn => "yarn",
            PackageManager::Bun => "bun",
        }
    }
}

/// The outcome of probing a project's working directory.
#[derive(Debug, Clone)]
pub struct Detection {
    pub runtime: Runtime,
    pub build_command: Option<String>,
    pub start_command: Option<String>,
    pub port: u16,
}

/// Detect a project's runtime from the files present at `root`. Probe
/// order matches the table in the detection contract: `Dockerfile` first
/// (the project brings its own recipe, so no commands are inferred), then
/// `package.json`, then the Python manifests, then `go.mod`, then
/// `index.html`, falling back to `unknown`.
pub fn detect(root: &Path) -> Detection {
    if root.join("Dockerfile").is_file() {
        return Detection { runtime: Runtime::Docker, build_command: None, start_command: None, port: 3000 };
    }
    if root.join("package.json").is_file() {
        return detect_nodejs(root);
    }
    if root.join("requirements.txt").is_file() {
        return Detection {
            runtime: Runtime::Python,
            build_command: Some("pip install -r requirements.txt".into()),
            start_command: Some("python app.py".into()),
            port: 8000,
        };
    }
    if root.join("pyproject.toml").is_file() {
        return Detection {
            runtime: Runtime::Python,
            build_command: Some("pip install .".into()),
            start_command: Some("python -m app".into()),
            port: 8000,
        };
    }
    if root.join("Pipfile").is_file() {
        return Detection {
            runtime: Runtime::Python,
            build_command: Some("pipenv install".into()),
            start_command: Some("pipenv run python app.py".into()),
            port: 8000,
        };
    }
    if root.join("go.mod").is_file() {
        return Detection {
            runtime: Runtime::Go,
            build_command: Some("go build -o app .".into()),
            start_command: Some("./app".into()),
            port: 8080,
        };
    }
    if root.join("index.html").is_file() {
        return Detection { runtime: Runtime::Static, build_command: None, start_command: None, port: 80 };
    }
    Detection { runtime: Runtime::Unknown, build_command: None, start_command: None, port: 3000 }
}

fn package_manager(root: &Path) -> PackageManager {
    if root.join("pnpm-lock.yaml").is_file() {
        PackageManager::Pnpm
    } else if root.join("yarn.lock").is_file() {
        PackageManager::Yarn
    } else if root.join("bun.lockb").is_file() {
        PackageManager::Bun
    } else {
        PackageManager::Npm
    }
}

fn detect_nodejs(root: &Path) -> Detection {
    let pm = package_manager(root);
    let bin = pm.binary();

    let is_next = ["next.config.js", "next.config.mjs", "next.config.ts"]
        .iter()
        .any(|f| root.join(f).is_file());
    let is_vite = ["vite.config.js", "vite.config.ts"]
        .iter()
        .any(|f| root.join(f).is_file());

    if is_next {
        return Detection {
            runtime: Runtime::NodeJs,
            build_command: Some(format!("{bin} install && {bin} build")),
            start_command: Some(format!("{bin} start")),
            port: 3000,
        };
    }
    if is_vite {
        return Detection {
            runtime: Runtime::NodeJs,
            build_command: Some(format!("{bin} install && {bin} build")),
            start_command: Some(format!("{bin} preview")),
            port: 4173,
        };
    }

    Detection {
        runtime: Runtime::NodeJs,
        build_command: Some(format!("{bin} install")),
        start_command: Some(format!("{bin} start")),
        port: 3000,
    }
}

/// Split a shell-like command string into exec-form argv tokens. Handles
/// single and double quoted segments so `sh -c "npm run start"`-shaped
/// commands tokenize the quoted portion as one argument; this is not a
/// full shell parser, just enough for the commands this detector and the
/// project form emit.
pub fn tokenize(command: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut has_token = false;

    for ch in command.chars() {
        match ch {
            '\'' if !in_double => {
                in_single = !in_single;
                has_token = true;
            }
            '"' if !in_single => {
                in_double = !in_double;
                has_token = true;
            }
            c if c.is_whitespace() && !in_single && !in_double => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

fn base_image(runtime: Runtime) -> &'static str {
    match runtime {
        Runtime::NodeJs => "node:20-slim",
        Runtime::Python => "python:3.12-slim",
        Runtime::Go => "golang:1.23-alpine",
        Runtime::Static => "nginx:alpine",
        Runtime::Docker | Runtime::Unknown => "debian:bookworm-slim",
    }
}

/// Render a Dockerfile for `detection`, given the project's effective
/// build/start commands (the project's own overrides, falling back to the
/// detection's defaults) and listen port. Returns `None` for `docker`
/// runtime — the project supplies its own `Dockerfile`, nothing is
/// synthesized.
pub fn synthesize_dockerfile(
    detection: &Detection,
    build_command: Option<&str>,
    start_command: Option<&str>,
    port: u16,
) -> Option<String> {
    if detection.runtime == Runtime::Docker {
        return None;
    }

    let image = base_image(detection.runtime);
    let mut out = format!("FROM {image}\nWORKDIR /app\nCOPY . .\n");

    if let Some(build) = build_command {
        out.push_str(&format!("RUN {build}\n"));
    }

    out.push_str(&format!("EXPOSE {port}\n"));

    if let Some(start) = start_command {
        let argv = tokenize(start);
        let quoted: Vec<String> = argv.iter().map(|t| format!("\"{t}\"")).collect();
        out.push_str(&format!("CMD [{}]\n", quoted.join(", ")));
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn detects_dockerfile_first() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Dockerfile"), "FROM scratch").unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        let detection = detect(dir.path());
        assert_eq!(detection.runtime, Runtime::Docker);
    }

    #[test]
    fn detects_plain_nodejs() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        let detection = detect(dir.path());
        assert_eq!(detection.runtime, Runtime::NodeJs);
        assert_eq!(detection.start_command.as_deref(), Some("npm start"));
        assert_eq!(detection.port, 3000);
    }

    #[test]
    fn detects_nodejs_with_pnpm_lockfile() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        fs::write(dir.path().join("pnpm-lock.yaml"), "").unwrap();
        let detection = detect(dir.path());
        assert_eq!(detection.start_command.as_deref(), Some("pnpm start"));
    }

    #[test]
    fn detects_next_framework_override() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        fs::write(dir.path().join("yarn.lock"), "").unwrap();
        fs::write(dir.path().join("next.config.js"), "").unwrap();
        let detection = detect(dir.path());
        assert_eq!(detection.build_command.as_deref(), Some("yarn install && yarn build"));
        assert_eq!(detection.start_command.as_deref(), Some("yarn start"));
        assert_eq!(detection.port, 3000);
    }

    #[test]
    fn detects_vite_framework_override_with_alt_port() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("package.json"), "{}").unwrap();
        fs::write(dir.path().join("vite.config.ts"), "").unwrap();
        let detection = detect(dir.path());
        assert_eq!(detection.start_command.as_deref(), Some("npm preview"));
        assert_eq!(detection.port, 4173);
    }

    #[test]
    fn detects_python_requirements_txt() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("requirements.txt"), "").unwrap();
        let detection = detect(dir.path());
        assert_eq!(detection.runtime, Runtime::Python);
        assert_eq!(detection.port, 8000);
    }

    #[test]
    fn detects_go_module() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("go.mod"), "module example\n").unwrap();
        let detection = detect(dir.path());
        assert_eq!(detection.runtime, Runtime::Go);
        assert_eq!(detection.port, 8080);
    }

    #[test]
    fn detects_static_site() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        let detection = detect(dir.path());
        assert_eq!(detection.runtime, Runtime::Static);
        assert_eq!(detection.port, 80);
    }

    #[test]
    fn falls_back_to_unknown() {
        let dir = tempdir().unwrap();
        let detection = detect(dir.path());
        assert_eq!(detection.runtime, Runtime::Unknown);
    }

    #[test]
    fn tokenizes_multi_word_command() {
        assert_eq!(tokenize("npm run start"), vec!["npm", "run", "start"]);
    }

    #[test]
    fn tokenize_respects_quotes() {
        assert_eq!(
            tokenize(r#"sh -c "npm run start""#),
            vec!["sh", "-c", "npm run start"]
        );
    }

    #[test]
    fn synthesized_dockerfile_uses_exec_form_cmd() {
        let detection = Detection {
            runtime: Runtime::NodeJs,
            build_command: Some("npm install".into()),
            start_command: Some("npm run start".into()),
            port: 3000,
        };
        let dockerfile =
            synthesize_dockerfile(&detection, Some("npm install"), Some("npm run start"), 3000).unwrap();
        assert!(dockerfile.contains("FROM node:20-slim"));
        assert!(dockerfile.contains(r#"CMD ["npm", "run", "start"]"#));
        assert!(dockerfile.contains("EXPOSE 3000"));
    }

    #[test]
    fn docker_runtime_synthesizes_nothing() {
        let detection = Detection { runtime: Runtime::Docker, build_command: None, start_command: None, port: 3000 };
        assert!(synthesize_dockerfile(&detection, None, None, 3000).is_none());
    }
}
