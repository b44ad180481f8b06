//! Export assembly: turning a stored component (or a session's whole
//! lineage) into a deterministic set of named text payloads. Packaging
//! into an archive is the caller's concern; this module only formats.

use serde::{Deserialize, Serialize};

use crate::model::{ComponentArtifact, Session};

/// Fallback identifier used when sanitizing strips a name to nothing.
pub const FALLBACK_COMPONENT_NAME: &str = "Component";

/// One named payload of an export bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportFile {
    pub path: String,
    pub contents: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Jsx,
    Tsx,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Jsx => "jsx",
            ExportFormat::Tsx => "tsx",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOptions {
    #[serde(default)]
    pub format: ExportFormat,
    #[serde(default = "default_true")]
    pub include_package_json: bool,
    #[serde(default = "default_true")]
    pub include_readme: bool,
    #[serde(default = "default_true")]
    pub include_example: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            format: ExportFormat::Jsx,
            include_package_json: true,
            include_readme: true,
            include_example: true,
        }
    }
}

/// Strip every character outside `[A-Za-z0-9]`; an empty result becomes
/// the fixed fallback identifier so filenames are never empty.
pub fn sanitize_name(name: &str) -> String {
    let sanitized: String = name.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if sanitized.is_empty() {
        FALLBACK_COMPONENT_NAME.to_string()
    } else {
        sanitized
    }
}

/// Assemble the export bundle for a single component: manifest, source,
/// stylesheet, usage doc and minimal example, per the options.
pub fn assemble_component(
    component: &ComponentArtifact,
    session: &Session,
    options: &ExportOptions,
) -> Vec<ExportFile> {
    let name = sanitize_name(&component.name);
    let ext = options.format.extension();
    let mut files = Vec::with_capacity(5);

    if options.include_package_json {
        files.push(ExportFile {
            path: "package.json".to_string(),
            contents: package_json(component, session, &name, options.format),
        });
    }

    files.push(ExportFile {
        path: format!("{name}.{ext}"),
        contents: component.jsx.clone(),
    });
    files.push(ExportFile {
        path: format!("{name}.css"),
        contents: component.css.clone(),
    });

    if options.include_readme {
        files.push(ExportFile {
            path: "README.md".to_string(),
            contents: readme(component, session, &name),
        });
    }

    if options.include_example {
        files.push(ExportFile {
            path: format!("Example.{ext}"),
            contents: example(component, &name),
        });
    }

    files
}

/// Assemble the full-history bundle: every historical artifact plus the
/// current one, each under its own version-suffixed directory, alongside a
/// session-level summary payload.
pub fn assemble_history(session: &Session, options: &ExportOptions) -> Vec<ExportFile> {
    let ext = options.format.extension();
    let mut files = Vec::new();

    let lineage = session
        .component_history
        .iter()
        .chain(session.current_component.iter());

    for component in lineage {
        let name = sanitize_name(&component.name);
        let dir = format!("{name}_v{}", component.version);

        files.push(ExportFile {
            path: format!("{dir}/{name}.{ext}"),
            contents: component.jsx.clone(),
        });
        files.push(ExportFile {
            path: format!("{dir}/{name}.css"),
            contents: component.css.clone(),
        });

        let info = serde_json::json!({
            "name": component.name,
            "version": component.version,
            "description": component.description,
            "createdAt": component.created_at,
            "generatedBy": component.generated_by,
            "props": component.props,
        });
        files.push(ExportFile {
            path: format!("{dir}/info.json"),
            contents: pretty(&info),
        });
    }

    let total_components =
        session.component_history.len() + usize::from(session.current_component.is_some());
    let summary = serde_json::json!({
        "sessionName": session.name,
        "description": session.description,
        "totalComponents": total_components,
        "createdAt": session.created_at,
        "lastAccessed": session.last_accessed,
        "metadata": session.metadata,
    });
    files.push(ExportFile {
        path: "session-summary.json".to_string(),
        contents: pretty(&summary),
    });

    files
}

fn package_json(
    component: &ComponentArtifact,
    session: &Session,
    name: &str,
    format: ExportFormat,
) -> String {
    let description = if component.description.is_empty() {
        format!("Generated React component: {}", component.name)
    } else {
        component.description.clone()
    };

    let dev_dependencies = match format {
        ExportFormat::Jsx => serde_json::json!({
            "@types/react": "^18.2.0",
            "@types/react-dom": "^18.2.0",
        }),
        ExportFormat::Tsx => serde_json::json!({
            "@types/react": "^18.2.0",
            "@types/react-dom": "^18.2.0",
            "typescript": "^5.0.0",
        }),
    };

    let manifest = serde_json::json!({
        "name": name.to_lowercase(),
        "version": "1.0.0",
        "description": description,
        "main": format!("{name}.{}", format.extension()),
        "dependencies": {
            "react": "^18.2.0",
            "react-dom": "^18.2.0",
        },
        "devDependencies": dev_dependencies,
        "keywords": ["react", "component", "generated"],
        "author": session.owner_id,
        "license": "MIT",
    });
    pretty(&manifest)
}

fn readme(component: &ComponentArtifact, session: &Session, name: &str) -> String {
    let description = if component.description.is_empty() {
        "Generated React component"
    } else {
        &component.description
    };

    let props_section = if component.props.is_empty() {
        "No props defined".to_string()
    } else {
        component
            .props
            .iter()
            .map(|(prop, ty)| format!("- **{prop}**: `{ty}`"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "# {title}\n\n{description}\n\n## Installation\n\n```bash\nnpm install\n```\n\n## Usage\n\n```jsx\nimport {name} from './{name}';\nimport './{name}.css';\n\nfunction App() {{\n  return (\n    <div>\n      <{name} />\n    </div>\n  );\n}}\n```\n\n## Props\n\n{props_section}\n\n## Generated Information\n\n- **Generated on**: {created}\n- **Component Version**: {version}\n- **Session**: {session_name}\n",
        title = component.name,
        created = component.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        version = component.version,
        session_name = session.name,
    )
}

fn example(component: &ComponentArtifact, name: &str) -> String {
    format!(
        "import React from 'react';\nimport {name} from './{name}';\nimport './{name}.css';\n\nexport default function Example() {{\n  return (\n    <div style={{{{ padding: '20px' }}}}>\n      <h1>Example Usage of {title}</h1>\n      <{name} />\n    </div>\n  );\n}}\n",
        title = component.name,
    )
}

fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).expect("static JSON shape")
}
