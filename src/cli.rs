use clap::Parser;
use llms_bootstrap::{ReinstallPolicy, Settings};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "llms-bootstrap")]
#[command(about = "Set up Python, pigz, llama.cpp and local-llms through Homebrew")]
#[command(version)]
pub struct Cli {
    /// Increase verbosity (use multiple times for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Reduce output to errors only
    #[arg(short, long)]
    pub quiet: bool,

    /// Settings file (default: <config dir>/llms-bootstrap/config.json)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Homebrew prefix, overriding the architecture-based guess
    #[arg(long, value_name = "DIR")]
    pub prefix: Option<PathBuf>,

    /// Minimum acceptable Python version (e.g. 3.10)
    #[arg(long, value_name = "VERSION")]
    pub min_python: Option<String>,

    /// Name of the virtual environment directory
    #[arg(long, value_name = "NAME")]
    pub venv: Option<String>,

    /// Directory to create the virtual environment in
    #[arg(long, value_name = "DIR")]
    pub work_dir: Option<PathBuf>,

    /// Shell profile that receives the PATH export
    #[arg(long, value_name = "PATH")]
    pub profile: Option<PathBuf>,

    /// Git URL local-llms is installed from
    #[arg(long, value_name = "URL")]
    pub app_source: Option<String>,

    /// Tag of local-llms to install
    #[arg(long, value_name = "TAG")]
    pub app_ref: Option<String>,

    /// What to do with an existing local-llms install
    #[arg(long, value_name = "POLICY")]
    pub reinstall: Option<ReinstallPolicy>,
}

impl Cli {
    /// Apply command-line overrides, the last settings layer.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(prefix) = &self.prefix {
            settings.install_prefix = Some(prefix.clone());
        }
        if let Some(min) = &self.min_python {
            settings.min_interpreter_version = min.clone();
        }
        if let Some(venv) = &self.venv {
            settings.venv_name = venv.clone();
        }
        if let Some(dir) = &self.work_dir {
            settings.work_dir = dir.clone();
        }
        if let Some(profile) = &self.profile {
            settings.profile_path = profile.clone();
        }
        if let Some(source) = &self.app_source {
            settings.app_source = source.clone();
        }
        if let Some(app_ref) = &self.app_ref {
            settings.app_ref = app_ref.clone();
        }
        if let Some(policy) = self.reinstall {
            settings.reinstall = policy;
        }
    }
}
