//! CS-070: CLI subcommands: run, validate, commands, policy, graph, completions.

use crate::core::log::Logger;
use crate::core::settings::{self, Settings};
use crate::core::template::Template;
use crate::core::types::{Action, Params, Value};
use crate::core::registry;
use crate::driver::{policy, Driver, MultiDriver};
use crate::graph::{codec, Graph, Triple};
use crate::provider::sim::SimCloud;
use crate::provider::CloudApi;
use clap::{CommandFactory, Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "cloudscript",
    version,
    about = "Cloud orchestration scripts: parse, dry-run, then run provider calls in order"
)]
pub struct Cli {
    /// Log debug lines (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fill, validate, dry-run, then run a script
    Run {
        /// Script file
        file: PathBuf,

        /// Hole value as name=value (repeatable)
        #[arg(long = "fill", value_name = "NAME=VALUE")]
        fills: Vec<String>,

        /// YAML mapping of hole names to values
        #[arg(long = "fills", value_name = "FILE")]
        fills_file: Option<PathBuf>,

        /// Run against the in-memory simulated provider
        #[arg(long)]
        simulate: bool,

        /// Do not ask before the live run
        #[arg(long)]
        no_confirm: bool,

        /// Stop after the dry run
        #[arg(long)]
        dry_run_only: bool,

        /// Config file (default: ~/.cloudscript/config.toml)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Parse scripts and check them against the command registry
    Validate {
        /// Script files or glob patterns
        #[arg(required = true)]
        files: Vec<String>,
    },

    /// List supported commands
    Commands {
        /// Only this action
        #[arg(long)]
        action: Option<String>,
    },

    /// Print the managed policy ARN for a service and access level
    Policy {
        service: String,

        /// readonly or full
        access: String,
    },

    /// Inventory graph files
    Graph {
        #[command(subcommand)]
        command: GraphCommands,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum GraphCommands {
    /// Convert between N-Triples (.nt) and binary inventory files
    Convert { input: PathBuf, output: PathBuf },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Run {
            file,
            fills,
            fills_file,
            simulate,
            no_confirm,
            dry_run_only,
            config,
        } => {
            let opts = RunOptions {
                fills: collect_fills(&fills, fills_file.as_deref())?,
                dry_run_only,
                confirm: !no_confirm,
            };
            cmd_run(&file, &opts, simulate, config.as_deref())
        }
        Commands::Validate { files } => cmd_validate(&files),
        Commands::Commands { action } => cmd_commands(action.as_deref()),
        Commands::Policy { service, access } => cmd_policy(&service, &access),
        Commands::Graph {
            command: GraphCommands::Convert { input, output },
        } => cmd_graph_convert(&input, &output),
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "cloudscript",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

// ============================================================================
// run
// ============================================================================

pub struct RunOptions {
    pub fills: Params,
    pub dry_run_only: bool,
    pub confirm: bool,
}

/// A fill value: integers and booleans are typed, `[a,b]` is a list.
pub fn parse_fill_value(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(b) = raw.parse::<bool>() {
        return Value::Bool(b);
    }
    if let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
        return Value::List(
            inner
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        );
    }
    Value::str(raw)
}

fn collect_fills(pairs: &[String], file: Option<&Path>) -> Result<Params, String> {
    let mut fills = match file {
        Some(path) => load_fills_file(path)?,
        None => Params::new(),
    };
    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("invalid fill '{}': expected name=value", pair))?;
        fills.insert(name.trim().to_string(), parse_fill_value(value.trim()));
    }
    Ok(fills)
}

/// Read a YAML mapping of hole names to scalar or list values.
pub fn load_fills_file(path: &Path) -> Result<Params, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let doc: serde_json::Value = serde_yaml_ng::from_str(&text)
        .map_err(|e| format!("invalid fills file {}: {}", path.display(), e))?;
    let map = doc
        .as_object()
        .ok_or_else(|| format!("{}: expected a mapping of hole names", path.display()))?;
    let mut fills = Params::new();
    for (name, value) in map {
        if let Some(v) = Value::from_json(value) {
            fills.insert(name.clone(), v);
        }
    }
    Ok(fills)
}

fn cmd_run(
    file: &Path,
    opts: &RunOptions,
    simulate: bool,
    config: Option<&Path>,
) -> Result<(), String> {
    let config = config
        .map(Path::to_path_buf)
        .unwrap_or_else(settings::default_config_path);
    let settings = settings::load_settings(&config)?;
    if !simulate {
        return Err(
            "no live provider client is configured in this build; pass --simulate".to_string(),
        );
    }
    let src = std::fs::read_to_string(file)
        .map_err(|e| format!("cannot read {}: {}", file.display(), e))?;

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let confirm = opts.confirm && !settings.auto_confirm;
    let opts = RunOptions {
        fills: opts.fills.clone(),
        dry_run_only: opts.dry_run_only,
        confirm,
    };
    let executed = run_script(
        &src,
        &opts,
        Arc::new(SimCloud::new()),
        settings,
        &mut input,
        &mut std::io::stderr(),
    )?;
    if let Some(t) = executed {
        println!("{}", t);
    }
    Ok(())
}

fn read_answer(input: &mut dyn BufRead, out: &mut dyn Write, question: &str) -> Option<String> {
    let _ = write!(out, "{}", question);
    let _ = out.flush();
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_string()).filter(|l| !l.is_empty()),
    }
}

/// Parse, fill, validate, dry-run and (unless stopped) run `src` against
/// `api`. Questions go to `out` and answers come from `input`. Returns the
/// executed template of the live run, or `None` when no live run happened.
pub fn run_script(
    src: &str,
    opts: &RunOptions,
    api: Arc<dyn CloudApi>,
    settings: Settings,
    input: &mut dyn BufRead,
    out: &mut dyn Write,
) -> Result<Option<Template>, String> {
    let mut template = Template::parse(src).map_err(|e| e.to_string())?;
    template.resolve_holes(&opts.fills);
    let declared: Vec<String> = template.declared().iter().map(|s| s.to_string()).collect();
    // holes named like a declaration are filled from its binding at run time
    template.resolve_holes_with(|hole| {
        if declared.iter().any(|d| d == hole) {
            return None;
        }
        read_answer(input, out, &format!("{}? ", hole)).map(|a| parse_fill_value(&a))
    });

    for warning in template.validate().map_err(|e| e.to_string())? {
        tracing::warn!("{}", warning);
    }

    let logger = Logger::default();
    let mut driver = MultiDriver::with_api(api, Arc::new(settings));
    driver.set_logger(logger.clone());

    template
        .compile(&mut driver, &logger)
        .map_err(|e| format!("dry run failed: {}", e))?;
    let _ = writeln!(out, "dry run OK");
    if opts.dry_run_only {
        return Ok(None);
    }

    if opts.confirm {
        let answer = read_answer(input, out, &format!("Run {}? [y/N] ", template))
            .unwrap_or_default();
        if !answer.eq_ignore_ascii_case("y") {
            let _ = writeln!(out, "aborted");
            return Ok(None);
        }
    }

    match template.run(&driver, &logger) {
        Ok(executed) => Ok(Some(executed)),
        Err(failure) => {
            if let Ok(revert) = failure.executed.revert() {
                if !revert.script.is_empty() {
                    let _ = writeln!(out, "to revert executed steps, run:\n{}", revert);
                }
            }
            Err(failure.to_string())
        }
    }
}

// ============================================================================
// validate / commands / policy
// ============================================================================

fn expand_patterns(patterns: &[String]) -> Result<Vec<PathBuf>, String> {
    let mut files = Vec::new();
    for pattern in patterns {
        let matches: Vec<PathBuf> = glob::glob(pattern)
            .map_err(|e| format!("invalid pattern '{}': {}", pattern, e))?
            .filter_map(Result::ok)
            .collect();
        if matches.is_empty() {
            files.push(PathBuf::from(pattern));
        } else {
            files.extend(matches);
        }
    }
    Ok(files)
}

/// Validate one script file. Returns the statement count and warnings.
pub fn validate_file(path: &Path) -> Result<(usize, Vec<String>), String> {
    let src = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let template = Template::parse(&src).map_err(|e| e.to_string())?;
    let warnings = template.validate().map_err(|e| e.to_string())?;
    Ok((template.script.len(), warnings))
}

fn cmd_validate(patterns: &[String]) -> Result<(), String> {
    let mut failed = 0;
    for file in expand_patterns(patterns)? {
        match validate_file(&file) {
            Ok((count, warnings)) => {
                println!("OK: {} ({} statements)", file.display(), count);
                for w in warnings {
                    println!("  WARN: {}", w);
                }
            }
            Err(e) => {
                eprintln!("  ERROR: {}: {}", file.display(), e);
                failed += 1;
            }
        }
    }
    if failed == 0 {
        Ok(())
    } else {
        Err(format!("{} file(s) failed validation", failed))
    }
}

/// Registry listing, one action per line.
pub fn format_commands(action: Option<Action>) -> Vec<String> {
    registry::entities_by_action()
        .into_iter()
        .filter(|(a, _)| action.map_or(true, |wanted| wanted == *a))
        .map(|(a, entities)| format!("{}: {}", a, entities.join(", ")))
        .collect()
}

fn cmd_commands(action: Option<&str>) -> Result<(), String> {
    let action = match action {
        Some(word) => Some(Action::parse(word).ok_or_else(|| format!("unknown action '{}'", word))?),
        None => None,
    };
    for line in format_commands(action) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_policy(service: &str, access: &str) -> Result<(), String> {
    match policy::lookup_policy(service, access) {
        Ok(arn) => {
            println!("{}", arn);
            Ok(())
        }
        Err(e) => {
            let suggestions = policy::policy_suggestions(service);
            if !suggestions.is_empty() {
                eprintln!("policies mentioning '{}':", service);
                for s in suggestions {
                    eprintln!("  {}", s);
                }
            }
            Err(e.to_string())
        }
    }
}

// ============================================================================
// graph
// ============================================================================

fn is_ntriples(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "nt")
}

pub fn read_graph(path: &Path) -> Result<Vec<Triple>, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("cannot read {}: {}", path.display(), e))?;
    let triples = if is_ntriples(path) {
        let text = String::from_utf8(bytes)
            .map_err(|_| format!("{}: not valid UTF-8", path.display()))?;
        codec::from_ntriples(&text)
    } else {
        codec::decode_binary(&bytes)
    };
    triples.map_err(|e| format!("{}: {}", path.display(), e))
}

pub fn write_graph(path: &Path, triples: &[Triple]) -> Result<(), String> {
    let bytes = if is_ntriples(path) {
        codec::to_ntriples(triples).into_bytes()
    } else {
        codec::encode_binary(triples)
    };
    std::fs::write(path, bytes).map_err(|e| format!("cannot write {}: {}", path.display(), e))
}

fn cmd_graph_convert(input: &Path, output: &Path) -> Result<(), String> {
    let triples = read_graph(input)?;
    write_graph(output, &triples)?;
    let graph = Graph::from_triples(triples);
    println!(
        "{} -> {} ({} triples, {})",
        input.display(),
        output.display(),
        graph.len(),
        graph.fingerprint()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Object;
    use std::io::Cursor;

    fn opts(confirm: bool, dry_run_only: bool) -> RunOptions {
        RunOptions {
            fills: Params::new(),
            dry_run_only,
            confirm,
        }
    }

    fn quick() -> Settings {
        Settings {
            poll_period_ms: 5,
            keys_dir: None,
            ..Settings::default()
        }
    }

    const SCRIPT: &str = "net = create vpc cidr={net-cidr}\ncreate subnet cidr=10.0.1.0/24 vpc=$net\n";

    #[test]
    fn test_cs070_parse_fill_values() {
        assert_eq!(parse_fill_value("3"), Value::Int(3));
        assert_eq!(parse_fill_value("true"), Value::Bool(true));
        assert_eq!(
            parse_fill_value("[a, b]"),
            Value::List(vec!["a".into(), "b".into()])
        );
        assert_eq!(parse_fill_value("10.0.0.0/16"), Value::str("10.0.0.0/16"));
    }

    #[test]
    fn test_cs070_collect_fills_from_flags_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fills.yaml");
        std::fs::write(&path, "net-cidr: 10.0.0.0/16\ncount: 2\n").unwrap();
        let fills = collect_fills(&["count=3".to_string()], Some(&path)).unwrap();
        assert_eq!(fills["net-cidr"], Value::str("10.0.0.0/16"));
        assert_eq!(fills["count"], Value::Int(3));
        assert!(collect_fills(&["novalue".to_string()], None).is_err());
    }

    #[test]
    fn test_cs070_run_script_prompts_and_confirms() {
        let sim = Arc::new(SimCloud::new());
        let mut input = Cursor::new("10.0.0.0/16\ny\n");
        let mut out = Vec::new();
        let executed = run_script(SCRIPT, &opts(true, false), sim.clone(), quick(), &mut input, &mut out)
            .unwrap()
            .unwrap();
        let prompts = String::from_utf8(out).unwrap();
        assert!(prompts.contains("net-cidr? "));
        assert!(prompts.contains("dry run OK"));
        assert!(executed.expressions().all(|e| e.executed));
        let subnet = &sim.calls_to("CreateSubnet");
        let live = subnet.last().unwrap();
        assert!(live.input["VpcId"].as_str().unwrap().starts_with("vpc-"));
    }

    #[test]
    fn test_cs070_run_script_declined_stays_dry() {
        let sim = Arc::new(SimCloud::new());
        let mut input = Cursor::new("10.0.0.0/16\nn\n");
        let mut out = Vec::new();
        let res = run_script(SCRIPT, &opts(true, false), sim.clone(), quick(), &mut input, &mut out)
            .unwrap();
        assert!(res.is_none());
        assert!(sim.calls().iter().all(|c| c.input["DryRun"] == true));
    }

    #[test]
    fn test_cs070_run_script_dry_run_only() {
        let sim = Arc::new(SimCloud::new());
        let mut o = opts(true, true);
        o.fills.insert("net-cidr".into(), Value::str("10.0.0.0/16"));
        let mut out = Vec::new();
        let res = run_script(SCRIPT, &o, sim, quick(), &mut Cursor::new(""), &mut out).unwrap();
        assert!(res.is_none());
    }

    #[test]
    fn test_cs070_run_script_reports_invalid_script() {
        let sim = Arc::new(SimCloud::new());
        let mut out = Vec::new();
        let err = run_script(
            "create subnet vpc=vpc-1\n",
            &opts(false, false),
            sim,
            quick(),
            &mut Cursor::new(""),
            &mut out,
        )
        .unwrap_err();
        assert!(err.contains("missing required params 'cidr'"));
    }

    #[test]
    fn test_cs070_validate_file() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("net.cs");
        std::fs::write(&good, "create vpc cidr=10.0.0.0/16 color=blue\n").unwrap();
        let (count, warnings) = validate_file(&good).unwrap();
        assert_eq!(count, 1);
        assert_eq!(warnings, vec!["create vpc: unexpected param key 'color'".to_string()]);
        assert!(validate_file(&dir.path().join("missing.cs")).is_err());
    }

    #[test]
    fn test_cs070_expand_patterns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.cs"), "").unwrap();
        std::fs::write(dir.path().join("b.cs"), "").unwrap();
        let pattern = format!("{}/*.cs", dir.path().display());
        assert_eq!(expand_patterns(&[pattern]).unwrap().len(), 2);
    }

    #[test]
    fn test_cs070_format_commands() {
        let lines = format_commands(Some(Action::Authenticate));
        assert_eq!(lines, vec!["authenticate: registry".to_string()]);
        assert!(format_commands(None).len() > 5);
    }

    #[test]
    fn test_cs070_graph_convert_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let nt = dir.path().join("inv.nt");
        let bin = dir.path().join("inv.bin");
        let triples = vec![
            Triple::new("vpc-1", "parent_of", Object::resource("subnet-1")),
            Triple::new("subnet-1", "name", Object::text("web")),
        ];
        write_graph(&nt, &triples).unwrap();
        cmd_graph_convert(&nt, &bin).unwrap();
        let mut back = read_graph(&bin).unwrap();
        back.sort();
        let mut want = triples;
        want.sort();
        assert_eq!(back, want);
    }

    #[test]
    fn test_cs070_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "cloudscript", "run", "net.cs", "--fill", "a=1", "--fill", "b=2", "--simulate",
            "--no-confirm",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                fills,
                simulate,
                no_confirm,
                dry_run_only,
                ..
            } => {
                assert_eq!(fills, vec!["a=1", "b=2"]);
                assert!(simulate && no_confirm && !dry_run_only);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
