use std::path::Path;

use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::run::config::CONFIG_FILE_NAME;
use crate::settings::ProjectSettings;

/// A complete job script: directives, a blank line, one launch line
///
/// Directive order is fixed by the header template, sbatch stops reading directives at the first
/// command so nothing may be written between the shebang and the last directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionScript {
    header: Header,
    launch: Launch,
    container_cmd: String,
}

impl SubmissionScript {
    /// Full script text, ready to be written to disk
    pub fn content(&self) -> String {
        // order is important when writing the file
        let contents = [self.header.content.as_str(), self.launch.content.as_str()];
        contents.concat()
    }

    pub fn lines(&self) -> Vec<String> {
        self.content().lines().map(str::to_string).collect()
    }

    /// The container invocation on its own, without srun
    pub fn container_command(&self) -> &str {
        &self.container_cmd
    }
}

/// Rendered directives
///
/// Sets job name, log file (keyed by the SLURM job id, `%A`), wall clock time, task, node and cpu
/// counts, partition, generic resources, excluded nodes, memory and exported environment.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Header {
    content: String,
}

/// Rendered srun line that starts the container
///
/// Binds the run directory to /notebooks and the dataset to /data, then runs the entry program
/// with the run config. The program's own output goes to `<run_path>/<project_name>.log`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Launch {
    content: String,
}

/// Rendering context for header
#[derive(Serialize)]
struct HeaderContext<'a> {
    prefix: &'a str,
    project_name: &'a str,
    log_pattern: String,
    time: &'a str,
    tasks: u32,
    nodes: u32,
    cpus: u32,
    partition: &'a str,
    gres: &'a str,
    exclude: &'a str,
    mem: &'a str,
    export: &'a str,
}

/// Rendering context for the container command
#[derive(Serialize)]
struct ContainerContext<'a> {
    run_path: String,
    data_path: String,
    image: String,
    entry_program: &'a str,
    config_name: &'a str,
}

/// Rendering context for the launch line
#[derive(Serialize)]
struct LaunchContext<'a> {
    project_name: &'a str,
    run_path: String,
    container_cmd: &'a str,
}

/// Render a job script. Doesn't touch the filesystem.
pub fn render_script(settings: &ProjectSettings,
                     run_path: &Path,
                     data_path: &Path) -> Result<SubmissionScript, tinytemplate::error::Error> {
    let header = render_header(settings)?;
    let container_cmd = render_container(settings, run_path, data_path)?;
    let launch = render_launch(settings, run_path, &container_cmd)?;
    Ok(SubmissionScript { header, launch, container_cmd })
}

/// Template engine with all job templates loaded, values are written as is
fn templates() -> Result<TinyTemplate<'static>, tinytemplate::error::Error> {
    /// included header template
    static HEADER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/header.txt"));
    /// included container command template
    static CONTAINER: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/container.txt"));
    /// included launch template
    static LAUNCH: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/launch.txt"));

    let mut tt = TinyTemplate::new();
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("header", HEADER)?;
    tt.add_template("container", CONTAINER)?;
    tt.add_template("launch", LAUNCH)?;
    Ok(tt)
}

fn render_header(settings: &ProjectSettings) -> Result<Header, tinytemplate::error::Error> {
    let context = HeaderContext {
        prefix: &settings.directive_prefix,
        project_name: &settings.project_name,
        log_pattern: settings.log_dir.join("slurm-%A.log").display().to_string(),
        time: &settings.wall_time,
        tasks: settings.tasks,
        nodes: settings.nodes,
        cpus: settings.cpus,
        partition: &settings.partition,
        gres: &settings.gres,
        exclude: &settings.exclude,
        mem: &settings.mem,
        export: &settings.export,
    };
    Ok(Header { content: templates()?.render("header", &context)? })
}

fn render_container(settings: &ProjectSettings,
                    run_path: &Path,
                    data_path: &Path) -> Result<String, tinytemplate::error::Error> {
    let context = ContainerContext {
        run_path: run_path.display().to_string(),
        data_path: data_path.display().to_string(),
        image: settings.container_image.display().to_string(),
        entry_program: &settings.entry_program,
        config_name: CONFIG_FILE_NAME,
    };
    let rendered = templates()?.render("container", &context)?;
    Ok(rendered.trim_end().to_string())
}

fn render_launch(settings: &ProjectSettings,
                 run_path: &Path,
                 container_cmd: &str) -> Result<Launch, tinytemplate::error::Error> {
    let context = LaunchContext {
        project_name: &settings.project_name,
        run_path: run_path.display().to_string(),
        container_cmd,
    };
    Ok(Launch { content: templates()?.render("launch", &context)? })
}
