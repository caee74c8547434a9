use clap::{Parser, ValueEnum};
use log::info;
use parallel_task_scheduler::algo::Coordinator;
use parallel_task_scheduler::data::{self, GraphShape};
use parallel_task_scheduler::run_reader;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::num::NonZero;
use std::path::{Path, PathBuf};

mod logger;

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Dot,
    Json,
}

impl From<OutputFormat> for data::Format {
    fn from(value: OutputFormat) -> Self {
        match value {
            OutputFormat::Dot => Self::Dot,
            OutputFormat::Json => Self::Json,
        }
    }
}

/// Application finding minimum makespan schedules of task graphs.
#[derive(Debug, Parser)]
#[command(version, about)]
enum Application {
    /// Schedule a task graph.
    Run {
        /// The input graph in DOT or JSON. `-` reads from stdin.
        input: String,
        /// The number of processors.
        processors: NonZero<usize>,
        /// The number of search workers.
        #[clap(short, long, default_value = "1")]
        parallel: NonZero<usize>,
        /// The output file. Defaults to `<INPUT>-output.<FORMAT>`, `-` writes to stdout.
        #[clap(short, long)]
        output: Option<String>,
        /// The output format.
        #[clap(short, long, value_enum, default_value_t)]
        format: OutputFormat,
        /// Do not share the best makespan with running workers.
        #[clap(long, default_value = "false")]
        no_broadcast: bool,
        /// Log progress.
        #[clap(short, long, default_value = "false")]
        verbose: bool,
    },
    /// Run benchmarks on a directory of graphs named `<processors>_<makespan>_<name>.dot`.
    Bench {
        /// The input directory.
        input: String,
        /// The number of search workers.
        #[clap(short, long, default_value = "1")]
        parallel: NonZero<usize>,
        /// Check the makespan against the one in the filename.
        #[clap(short, long, default_value = "false")]
        check: bool,
    },
    /// Generate random task graphs.
    Gen {
        /// The number of processors written into the filenames.
        processors: NonZero<usize>,
        /// The number of tasks.
        tasks: NonZero<usize>,
        /// The maximum weight of a task.
        max_weight: NonZero<u64>,
        /// The maximum communication cost of an edge.
        #[clap(short = 'c', long, default_value = "5")]
        max_communication: u64,
        /// Probability that a task depends on any given earlier task.
        #[clap(short, long, default_value = "0.3")]
        density: f64,
        /// Number of graphs to generate.
        #[clap(short, long, default_value = "1")]
        amount: NonZero<u64>,
        /// Path to output the generated graphs. If the directory does not exist, it will be created.
        #[clap(short, long, default_value = "output")]
        output: String,
    },
}

fn default_output(input: &str, format: OutputFormat) -> PathBuf {
    let input = Path::new(input);
    let extension = match format {
        OutputFormat::Dot => "dot",
        OutputFormat::Json => "json",
    };
    let stem = input.file_stem().map_or_else(
        || "graph".into(),
        |stem| stem.to_string_lossy().into_owned(),
    );
    input.with_file_name(format!("{stem}-output.{extension}"))
}

fn main() -> anyhow::Result<()> {
    let application = Application::parse();
    let verbose = matches!(application, Application::Run { verbose: true, .. });
    logger::init(verbose)?;

    match application {
        Application::Run {
            input,
            processors,
            parallel,
            output,
            format,
            no_broadcast,
            ..
        } => {
            let coordinator = Coordinator::new(parallel.get(), processors.get())?
                .with_bound_broadcast(!no_broadcast);

            let output = output.map_or_else(|| default_output(&input, format), PathBuf::from);
            let mut writer: Box<dyn Write> = if output.as_os_str() == "-" {
                Box::new(std::io::stdout().lock())
            } else {
                Box::new(BufWriter::new(File::create(&output)?))
            };

            let makespan = if input == "-" {
                let mut reader = std::io::stdin().lock();
                run_reader(&coordinator, &mut reader, &mut writer, format.into())?
            } else {
                let mut reader = BufReader::new(File::open(&input)?);
                run_reader(&coordinator, &mut reader, &mut writer, format.into())?
            };
            writer.flush()?;

            info!("makespan {makespan} written to {}", output.display());
            Ok(())
        }
        Application::Bench {
            input,
            parallel,
            check,
        } => {
            println!("{}", data::run(&input, check, parallel.get())?);
            Ok(())
        }
        Application::Gen {
            processors,
            tasks,
            max_weight,
            max_communication,
            density,
            amount,
            output,
        } => {
            let shape = GraphShape {
                tasks: tasks.get(),
                max_weight: max_weight.get(),
                max_communication,
                density,
            };

            let output = Path::new(&output);
            if !output.try_exists()? {
                std::fs::create_dir_all(output)?;
            }

            let mut rng = rand::thread_rng();
            for i in 0..amount.get() {
                let graph = data::generate(&shape, &mut rng)?;
                let graph = data::NamedGraph::new(format!("graph{i}"), graph);
                let filename = format!("{processors}_0_graph{i}.dot");
                File::create(output.join(filename))?
                    .write_all(data::to_string(&graph, None).as_bytes())?;
            }
            Ok(())
        }
    }
}
