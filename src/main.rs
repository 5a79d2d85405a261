use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use phpantom_stubs::parser::names::NameContext;
use phpantom_stubs::type_expr::{CompileContext, compile};
use phpantom_stubs::{
    ArgValue, CallArgument, CallSite, Error, ResolverConfig, Severity, StubResolver, TypeExpr,
    config, logging,
};

/// Query a phpstorm-style stub bundle.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file.  Defaults to `phpantom-stubs.toml` in the working
    /// directory, or built-in defaults when there is none.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level (overridden by PHPANTOM_STUBS_LOG / RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the database (or load it from cache) and print a summary.
    Build,
    /// Print a symbol.
    Lookup { name: String },
    /// Print the inheritance-merged members of a class.
    Members { class: String },
    /// Print the linearized ancestors of a class.
    Ancestors { class: String },
    /// Evaluate the return type of a call.
    Resolve {
        /// Function name or `Class::method`.
        name: String,
        /// Receiver type, e.g. `ArrayObject<string, int>`.
        #[arg(long)]
        receiver: Option<String>,
        /// Positional arguments as type expressions; literal types such as
        /// `5` or `'x'` count as known values.
        #[arg(long = "arg")]
        args: Vec<String>,
        /// Explicit template arguments.
        #[arg(long = "template")]
        templates: Vec<String>,
    },
    /// Print the effects declared for a symbol.
    Effects { name: String },
    /// Print load diagnostics.
    Diagnostics {
        /// Only show warnings and errors.
        #[arg(long)]
        warnings: bool,
    },
}

#[derive(Serialize)]
struct Summary<'a> {
    bundle: &'a phpantom_stubs::BundleInfo,
    symbols: usize,
    classes: usize,
    functions: usize,
    constants: usize,
    diagnostics: usize,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> phpantom_stubs::Result<()> {
    let cwd = std::env::current_dir().map_err(|source| Error::Io {
        path: PathBuf::from("."),
        source,
    })?;
    let (config, base_dir) = match &cli.config {
        Some(path) => {
            let base = path.parent().map(PathBuf::from).unwrap_or_else(|| cwd.clone());
            (ResolverConfig::load(path)?, base)
        }
        None => (ResolverConfig::discover(&cwd)?, cwd.clone()),
    };
    tracing::debug!(file = config::CONFIG_FILE_NAME, base = %base_dir.display(), "configuration loaded");
    let resolver = StubResolver::build(&config, &base_dir)?;
    let db = resolver.database();

    match cli.command {
        Command::Build => print(&Summary {
            bundle: db.bundle(),
            symbols: db.symbols().len(),
            classes: db.classes().len(),
            functions: db.functions().len(),
            constants: db.constants().len(),
            diagnostics: db.diagnostics().len(),
        }),
        Command::Lookup { name } => {
            let symbol = resolver
                .lookup_symbol(&name)
                .ok_or(Error::UnknownSymbol(name))?;
            print(symbol)
        }
        Command::Members { class } => {
            known_class(&resolver, &class)?;
            print(&resolver.members(&class))
        }
        Command::Ancestors { class } => {
            known_class(&resolver, &class)?;
            print(&resolver.ancestors(&class))
        }
        Command::Resolve {
            name,
            receiver,
            args,
            templates,
        } => {
            let names = NameContext::default();
            let ctx = CompileContext::bare(&names);
            let parse = |text: &str| {
                compile(text, &ctx).map_err(|source| Error::InvalidType {
                    text: text.to_string(),
                    source,
                })
            };
            let site = CallSite {
                receiver: receiver.as_deref().map(parse).transpose()?,
                args: args
                    .iter()
                    .map(|a| {
                        parse(a).map(|ty| CallArgument {
                            name: None,
                            value: match ty {
                                TypeExpr::Literal(value) => ArgValue::Literal(value),
                                other => ArgValue::Type(other),
                            },
                        })
                    })
                    .collect::<Result<_, _>>()?,
                template_args: templates.iter().map(|t| parse(t)).collect::<Result<_, _>>()?,
            };
            let ty = resolver.resolve_call(&name, &site)?;
            println!("{ty}");
            Ok(())
        }
        Command::Effects { name } => {
            let effects = resolver.effects(&name).ok_or(Error::UnknownSymbol(name))?;
            print(&effects)
        }
        Command::Diagnostics { warnings } => {
            let shown: Vec<_> = db
                .diagnostics()
                .iter()
                .filter(|d| !warnings || d.severity >= Severity::Warning)
                .collect();
            print(&shown)
        }
    }
}

fn known_class(resolver: &StubResolver, class: &str) -> phpantom_stubs::Result<()> {
    match resolver.database().lookup_class(class) {
        Some(_) => Ok(()),
        None => Err(Error::UnknownSymbol(class.to_string())),
    }
}

fn print(value: &impl Serialize) -> phpantom_stubs::Result<()> {
    let text = serde_json::to_string_pretty(value).map_err(Error::Serialize)?;
    println!("{text}");
    Ok(())
}
