use clap::{Parser, Subcommand};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::{json, Value};

/// Everything but RFC 3986 unreserved characters, so a label stays one path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

#[derive(Parser)]
#[command(name = "allocator-cli")]
#[command(about = "Client for the VPN allocator API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue (or re-issue) an access URL for a user
    Invite {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        user_id: i64,
    },
    /// Show traffic usage for a credential label
    Usage { label: String },
    /// List the current server pool
    Servers,
    /// Check allocator liveness
    Health,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let res = match cli.command {
        Commands::Invite { first_name, last_name, user_id } => {
            client
                .post(format!("{}/api/v1/invites", base))
                .json(&json!({
                    "first_name": first_name,
                    "last_name": last_name,
                    "user_id": user_id,
                }))
                .send()
                .await?
        }
        Commands::Usage { label } => {
            client.get(usage_url(base, &label)).send().await?
        }
        Commands::Servers => client.get(format!("{}/api/v1/servers", base)).send().await?,
        Commands::Health => client.get(format!("{}/health", base)).send().await?,
    };

    print_response(res).await
}

fn usage_url(base: &str, label: &str) -> String {
    format!("{}/api/v1/usage/{}", base, utf8_percent_encode(label, PATH_SEGMENT))
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: allocator returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_label_is_one_segment() {
        assert_eq!(
            usage_url("http://h", "Ann_Lee_1"),
            "http://h/api/v1/usage/Ann_Lee_1"
        );
        assert_eq!(
            usage_url("http://h", "a/b?c#d_1"),
            "http://h/api/v1/usage/a%2Fb%3Fc%23d_1"
        );
        assert_eq!(
            usage_url("http://h", "Анна__2"),
            "http://h/api/v1/usage/%D0%90%D0%BD%D0%BD%D0%B0__2"
        );
    }
}
