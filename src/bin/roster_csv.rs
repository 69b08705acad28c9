use anyhow::Context;
use clap::Parser;
use group_signup::app::roster;
use group_signup::utils::logger;

#[derive(Parser)]
#[command(name = "roster-csv")]
#[command(about = "Convert an LMS course membership export into a roster CSV")]
struct Args {
    /// LMS hostname, e.g. blackboard.example.edu
    #[arg(long)]
    host: Option<String>,

    /// Course ID; with --host, prints the memberships URL to download
    #[arg(long)]
    course_id: Option<String>,

    /// Saved memberships JSON
    #[arg(short, long)]
    input: Option<String>,

    /// Output CSV path
    #[arg(short, long, default_value = "roster.csv")]
    output: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    if let (Some(host), Some(course_id)) = (&args.host, &args.course_id) {
        println!("Log in to the LMS, open the following URL and save the response:");
        println!("\n{}\n", roster::memberships_url(host, course_id));
    }

    let Some(input) = args.input else {
        if args.host.is_none() || args.course_id.is_none() {
            eprintln!("❌ Nothing to do: pass --input, or --host and --course-id");
            std::process::exit(1);
        }
        return Ok(());
    };

    let json = std::fs::read(&input).with_context(|| format!("Failed to read {}", input))?;
    let entries = roster::extract_roster(&json)
        .with_context(|| format!("{} is not a memberships export", input))?;

    let file = std::fs::File::create(&args.output)
        .with_context(|| format!("Failed to create {}", args.output))?;
    roster::write_roster_csv(&entries, file)?;

    tracing::info!("✅ Wrote {} students", entries.len());
    println!("✅ {} students saved to {}", entries.len(), args.output);
    Ok(())
}
