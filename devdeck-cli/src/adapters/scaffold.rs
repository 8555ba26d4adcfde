//! Project scaffolding: a Vite + React frontend and a FastAPI backend with
//! the allocated ports baked into their configs.

use std::io;
use std::path::Path;

use tokio::fs;

use devdeck_core::model::{PortPair, ProjectConfig};

pub async fn write_project(root: &Path, name: &str, ports: PortPair) -> io::Result<()> {
    write_frontend(&root.join("frontend"), name, ports).await?;
    write_backend(&root.join("backend"), name, ports).await?;
    Ok(())
}

async fn write_frontend(dir: &Path, name: &str, ports: PortPair) -> io::Result<()> {
    let src = dir.join("src");
    fs::create_dir_all(&src).await?;

    let package = format!(
        r#"{{
  "name": "{slug}-frontend",
  "private": true,
  "version": "0.1.0",
  "type": "module",
  "scripts": {{
    "dev": "vite --host 127.0.0.1 --port {port}",
    "build": "tsc -b && vite build",
    "preview": "vite preview"
  }},
  "dependencies": {{
    "react": "^19.1.0",
    "react-dom": "^19.1.0"
  }},
  "devDependencies": {{
    "@types/react": "^19.1.6",
    "@types/react-dom": "^19.1.5",
    "@vitejs/plugin-react": "^4.5.0",
    "typescript": "~5.8.3",
    "vite": "^7.0.0"
  }}
}}
"#,
        slug = ProjectConfig::slug(name),
        port = ports.frontend,
    );
    fs::write(dir.join("package.json"), package).await?;

    let env = format!("VITE_API_URL=http://127.0.0.1:{}\n", ports.backend);
    fs::write(dir.join(".env.example"), &env).await?;
    fs::write(dir.join(".env"), &env).await?;

    let vite_config = format!(
        r#"import {{ defineConfig }} from "vite";
import react from "@vitejs/plugin-react";

export default defineConfig({{
  plugins: [react()],
  server: {{
    host: "127.0.0.1",
    port: {},
    strictPort: true,
  }},
}});
"#,
        ports.frontend
    );
    fs::write(dir.join("vite.config.ts"), vite_config).await?;

    let tsconfig = r#"{
  "compilerOptions": {
    "target": "ES2020",
    "lib": ["ES2020", "DOM", "DOM.Iterable"],
    "module": "ESNext",
    "moduleResolution": "bundler",
    "types": ["vite/client"],
    "skipLibCheck": true,
    "noEmit": true,
    "jsx": "react-jsx",
    "strict": true
  },
  "include": ["src"]
}
"#;
    fs::write(dir.join("tsconfig.json"), tsconfig).await?;

    let index_html = format!(
        r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <title>{}</title>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/main.tsx"></script>
  </body>
</html>
"#,
        name
    );
    fs::write(dir.join("index.html"), index_html).await?;

    let main_tsx = r#"import React from 'react';
import ReactDOM from 'react-dom/client';
import App from './App';

ReactDOM.createRoot(document.getElementById('root')!).render(
  <React.StrictMode>
    <App />
  </React.StrictMode>,
);
"#;
    fs::write(src.join("main.tsx"), main_tsx).await?;

    let app_tsx = format!(
        r#"import {{ useEffect, useState }} from 'react';

const API_URL = import.meta.env.VITE_API_URL;

export default function App() {{
  const [status, setStatus] = useState('checking...');

  useEffect(() => {{
    fetch(`${{API_URL}}/health`)
      .then((r) => r.json())
      .then((body) => setStatus(body.status))
      .catch(() => setStatus('unreachable'));
  }}, []);

  return (
    <main>
      <h1>{}</h1>
      <p>backend: {{status}}</p>
    </main>
  );
}}
"#,
        name
    );
    fs::write(src.join("App.tsx"), app_tsx).await?;

    Ok(())
}

async fn write_backend(dir: &Path, name: &str, ports: PortPair) -> io::Result<()> {
    fs::create_dir_all(dir).await?;

    let env = format!("DATABASE_URL=sqlite:///./app.db\nBACKEND_PORT={}\n", ports.backend);
    fs::write(dir.join(".env.example"), &env).await?;
    fs::write(dir.join(".env"), &env).await?;

    let main_py = format!(
        r#"from fastapi import FastAPI
from fastapi.middleware.cors import CORSMiddleware

app = FastAPI(title="{name}")

app.add_middleware(
    CORSMiddleware,
    allow_origins=["http://127.0.0.1:{frontend}"],
    allow_methods=["*"],
    allow_headers=["*"],
)


@app.get("/health")
async def health():
    return {{"status": "healthy"}}


@app.get("/")
async def root():
    return {{"message": "Welcome to {name}"}}
"#,
        name = name,
        frontend = ports.frontend,
    );
    fs::write(dir.join("main.py"), main_py).await?;

    let requirements = "fastapi>=0.115.0\nuvicorn[standard]>=0.34.0\npython-dotenv>=1.0.0\n";
    fs::write(dir.join("requirements.txt"), requirements).await?;

    Ok(())
}
