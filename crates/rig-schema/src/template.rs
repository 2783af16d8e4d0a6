//! Minimal renderer for the `{{ .Var }}` templates used in registry metadata.
//!
//! Registries only ever use a handful of variables and a few helpers, so a
//! full template engine is not needed. Supported forms:
//!
//! - `{{ .Version }}`
//! - `{{ trimV .Version }}` / `{{ title .OS }}` / `{{ lower .Arch }}` / `{{ upper .OS }}`

use thiserror::Error;

/// A template that cannot be rendered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// `{{` without a matching `}}`.
    #[error("Unclosed template expression in '{0}'")]
    Unclosed(String),

    /// A `.Var` we do not know.
    #[error("Unknown template variable: .{0}")]
    UnknownVariable(String),

    /// A helper we do not know.
    #[error("Unknown template function: {0}")]
    UnknownFunction(String),

    /// Anything that is neither `.Var` nor `fn .Var`.
    #[error("Malformed template expression: {{{{{0}}}}}")]
    Malformed(String),

    /// A known variable with no value in this context, e.g. `.Asset`.
    #[error("Template variable .{0} is not available here")]
    Unavailable(&'static str),
}

/// Values a template may reference.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// `.Version`
    pub version: String,
    /// `.OS`, after replacements.
    pub os: String,
    /// `.Arch`, after replacements.
    pub arch: String,
    /// `.Format`
    pub format: String,
    /// `.Asset`, only while rendering file and checksum paths.
    pub asset: Option<String>,
}

impl TemplateContext {
    fn lookup(&self, var: &str) -> Result<String, TemplateError> {
        match var {
            "Version" => Ok(self.version.clone()),
            "SemVer" => Ok(trim_v(&self.version).to_string()),
            "OS" | "GOOS" => Ok(self.os.clone()),
            "Arch" | "GOARCH" => Ok(self.arch.clone()),
            "Format" => Ok(self.format.clone()),
            "Asset" => self.asset.clone().ok_or(TemplateError::Unavailable("Asset")),
            "AssetWithoutExt" => self
                .asset
                .as_deref()
                .map(strip_known_ext)
                .ok_or(TemplateError::Unavailable("AssetWithoutExt")),
            other => Err(TemplateError::UnknownVariable(other.to_string())),
        }
    }
}

fn trim_v(s: &str) -> &str {
    s.strip_prefix('v').unwrap_or(s)
}

fn strip_known_ext(asset: &str) -> String {
    const EXTS: [&str; 7] = [".tar.gz", ".tar.zst", ".tgz", ".tar", ".zip", ".gz", ".exe"];
    let lower = asset.to_lowercase();
    for ext in EXTS {
        if lower.ends_with(ext) {
            return asset[..asset.len() - ext.len()].to_string();
        }
    }
    asset.to_string()
}

fn title(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn eval(expr: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
    let tokens: Vec<&str> = expr.split_whitespace().collect();
    let (func, var) = match tokens.as_slice() {
        [var] => (None, *var),
        [func, var] => (Some(*func), *var),
        _ => return Err(TemplateError::Malformed(expr.to_string())),
    };

    let name = var
        .strip_prefix('.')
        .ok_or_else(|| TemplateError::Malformed(expr.to_string()))?;
    let value = ctx.lookup(name)?;

    match func {
        None => Ok(value),
        Some("trimV") => Ok(trim_v(&value).to_string()),
        Some("title") => Ok(title(&value)),
        Some("lower") => Ok(value.to_lowercase()),
        Some("upper") => Ok(value.to_uppercase()),
        Some(other) => Err(TemplateError::UnknownFunction(other.to_string())),
    }
}

/// Render `template` against `ctx`.
///
/// # Errors
///
/// Fails on unclosed `{{`, unknown variables or functions, and variables
/// that the context does not provide.
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("}}")
            .ok_or_else(|| TemplateError::Unclosed(template.to_string()))?;
        out.push_str(&eval(after[..end].trim(), ctx)?);
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    Ok(out)
}
