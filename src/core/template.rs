//! Template rendering for topology documents and messages.
//!
//! Variables come from three layers, later layers winning:
//! 1. Builtins: `Project`, `Home`, `OS`, `Arch`
//! 2. User-configured `template_vars`
//! 3. Call-site variables (e.g. `Error` for failure messages)
//!
//! Rendering is strict: a reference to an undefined variable fails the
//! render instead of producing empty text.

use std::collections::BTreeMap;
use std::fmt::Display;

use minijinja::{Environment, UndefinedBehavior, Value};

use crate::config::Config;
use crate::error::Result;

/// Call-site variables passed to a single render
pub type Vars = BTreeMap<String, Value>;

/// Renders templates against the merged variable namespace
pub struct Renderer {
    env: Environment<'static>,

    /// Builtins merged with user variables, computed once per process
    base: Vars,
}

impl Renderer {
    /// Create a renderer for a project with user-supplied variables
    pub fn new(project_name: &str, template_vars: &BTreeMap<String, serde_json::Value>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);

        let mut base = builtin_vars(project_name);
        for (key, value) in template_vars {
            base.insert(key.clone(), Value::from_serialize(value));
        }

        Self { env, base }
    }

    /// Create a renderer from a configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.project_name, &config.template_vars)
    }

    /// Render `template` with the merged namespace plus `vars`
    pub fn render(&self, template: &str, vars: Option<&Vars>) -> Result<String> {
        let mut context = self.base.clone();
        if let Some(vars) = vars {
            context.extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        Ok(self.env.render_str(template, context)?)
    }

    /// Render or abort the process.
    ///
    /// Only meant for startup-time preparation such as command descriptions.
    pub fn must_render(&self, template: &str, vars: Option<&Vars>) -> String {
        self.render(template, vars)
            .unwrap_or_else(|err| panic!("cannot render template {:?}: {}", template, err))
    }

    /// Value of a variable in the merged namespace
    pub fn var(&self, name: &str) -> Option<&Value> {
        self.base.get(name)
    }
}

/// Variables injected into every render
fn builtin_vars(project_name: &str) -> Vars {
    let home = dirs::home_dir()
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    let mut vars = Vars::new();
    vars.insert("Project".to_string(), Value::from(project_name));
    vars.insert("Home".to_string(), Value::from(home));
    vars.insert("OS".to_string(), Value::from(std::env::consts::OS));
    vars.insert("Arch".to_string(), Value::from(std::env::consts::ARCH));
    vars
}

/// Call-site variables for a failure message
pub fn error_vars(err: &dyn Display) -> Vars {
    let mut vars = Vars::new();
    vars.insert("Error".to_string(), Value::from(err.to_string()));
    vars
}
