//! Roomcast CLI
//!
//! Command-line client for a running Roomcast server:
//! - Sign up and log in
//! - List and create rooms
//! - Read room history and post messages
//! - Check server status

use clap::{Parser, Subcommand};
use roomcast::api::dto::{
    CreateRoomRequest, CredentialsRequest, HealthResponse, PostMessageRequest,
    PostMessageResponse, RoomMessagesResponse, TokenResponse,
};
use roomcast::store::{Message, Room};

#[derive(Parser)]
#[command(name = "roomcast-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Command-line client for the Roomcast chat relay")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API server URL
    #[arg(long, default_value = "http://localhost:8080", global = true)]
    pub api_url: String,

    /// Bearer token (default: $ROOMCAST_TOKEN)
    #[arg(long, global = true)]
    pub token: Option<String>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account
    Signup {
        username: String,
        #[arg(short, long)]
        password: String,
    },

    /// Log in and print a token
    Login {
        username: String,
        #[arg(short, long)]
        password: String,
    },

    /// List rooms
    Rooms,

    /// Create a room
    CreateRoom {
        /// Room name (lowercase letters, digits, '-' and '_')
        name: String,
    },

    /// Show a room's message history
    History {
        room: String,
        /// Only show the last N messages
        #[arg(short = 'n', long)]
        last: Option<usize>,
    },

    /// Post a message to a room
    Post {
        room: String,
        /// Message text
        body: Vec<String>,
    },

    /// Show server status
    Status,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let token = cli
        .token
        .clone()
        .or_else(|| std::env::var("ROOMCAST_TOKEN").ok());

    match cli.command {
        Commands::Signup { username, password } => {
            let response = client
                .post(format!("{}/api/v1/auth/signup", cli.api_url))
                .json(&CredentialsRequest {
                    username: username.clone(),
                    password,
                })
                .send()
                .await?;

            check(response, "Signup failed").await;
            println!("Created user {}", username);
        }

        Commands::Login { username, password } => {
            let response = client
                .post(format!("{}/api/v1/auth/login", cli.api_url))
                .json(&CredentialsRequest { username, password })
                .send()
                .await?;

            let login: TokenResponse = check(response, "Login failed").await.json().await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&login)?);
            } else {
                println!("{}", login.token);
                eprintln!();
                eprintln!("Token valid for {}.", format_duration(login.expires_in.max(0) as u64));
                eprintln!("Use it with --token or export ROOMCAST_TOKEN=<token>");
            }
        }

        Commands::Rooms => {
            let response = client
                .get(format!("{}/api/v1/rooms", cli.api_url))
                .send()
                .await?;

            let rooms: Vec<Room> = check(response, "Failed to fetch rooms").await.json().await?;

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(&rooms)?);
            } else if rooms.is_empty() {
                println!("No rooms yet.");
                println!();
                println!("Create one with:");
                println!("  roomcast-cli create-room general");
            } else {
                println!("{:<32} {}", "Room", "Created");
                println!("{}", "-".repeat(52));
                for room in rooms {
                    println!(
                        "{:<32} {}",
                        room.name,
                        room.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }

        Commands::CreateRoom { name } => {
            let response = authorized(
                client.post(format!("{}/api/v1/rooms", cli.api_url)),
                &token,
            )
            .json(&CreateRoomRequest { name })
            .send()
            .await?;

            let room: Room = check(response, "Failed to create room").await.json().await?;
            println!("Created room {}", room.name);
        }

        Commands::History { room, last } => {
            let response = client
                .get(format!("{}/api/v1/rooms/{}/messages", cli.api_url, room))
                .send()
                .await?;

            let history: RoomMessagesResponse =
                check(response, "Failed to fetch history").await.json().await?;

            let skip = last
                .map(|n| history.messages.len().saturating_sub(n))
                .unwrap_or(0);
            let messages = &history.messages[skip..];

            if cli.format == "json" {
                println!("{}", serde_json::to_string_pretty(messages)?);
            } else if messages.is_empty() {
                println!("No messages in {}", history.room_name);
            } else {
                for message in messages {
                    print_message(message);
                }
            }
        }

        Commands::Post { room, body } => {
            let body = body.join(" ");
            if body.trim().is_empty() {
                eprintln!("Message text is required");
                std::process::exit(1);
            }

            let response = authorized(
                client.post(format!("{}/api/v1/rooms/{}/messages", cli.api_url, room)),
                &token,
            )
            .json(&PostMessageRequest { body })
            .send()
            .await?;

            let posted: PostMessageResponse =
                check(response, "Failed to post message").await.json().await?;
            println!("{} (#{})", posted.message, posted.data.id);
        }

        Commands::Status => {
            let response = client
                .get(format!("{}/health", cli.api_url))
                .send()
                .await;

            match response {
                Ok(resp) if resp.status().is_success() => {
                    let health: HealthResponse = resp.json().await?;

                    if cli.format == "json" {
                        println!("{}", serde_json::to_string_pretty(&health)?);
                        return Ok(());
                    }

                    println!("Roomcast v{}", health.version);
                    println!();
                    println!("API Status: {}", health.status);
                    println!("Store:      {}", health.store);
                    println!();
                    println!("Connections:  {}", health.connections);
                    println!("Active rooms: {}", health.active_rooms);
                    println!();
                    println!("Uptime: {}", format_duration(health.uptime_seconds));
                }
                Ok(resp) => {
                    eprintln!("API returned error: {}", resp.status());
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("Cannot connect to Roomcast API at {}", cli.api_url);
                    eprintln!("Error: {}", e);
                    eprintln!();
                    eprintln!("Make sure the Roomcast server is running:");
                    eprintln!("  cargo run --bin roomcast");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn authorized(request: reqwest::RequestBuilder, token: &Option<String>) -> reqwest::RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => {
            eprintln!("This command needs a token: run `roomcast-cli login` first");
            std::process::exit(1);
        }
    }
}

/// Exit with the server's error body on a non-2xx response
async fn check(response: reqwest::Response, context: &str) -> reqwest::Response {
    if response.status().is_success() {
        return response;
    }

    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(text);
    eprintln!("{} ({}): {}", context, status, message);
    std::process::exit(1);
}

fn print_message(message: &Message) {
    println!(
        "[{}] {}: {}",
        message.created_at.format("%Y-%m-%d %H:%M:%S"),
        message.author,
        message.body
    );
}

fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else if seconds < 86400 {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    } else {
        format!("{}d {}h", seconds / 86400, (seconds % 86400) / 3600)
    }
}
