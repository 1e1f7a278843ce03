use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct ServerCommand {
    /// YAML config file (listen_addr, allowed_arns, sts_domain)
    #[arg(short, long, env = "STS_AUTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Address to listen on, overrides the config file
    #[arg(short, long, env = "LISTEN_ADDR")]
    pub listen_addr: Option<SocketAddr>,

    /// IAM user or role ARN allowed to call the server (repeatable)
    #[arg(short = 'a', long = "allow-arn", env = "ALLOWED_ARNS", value_delimiter = ',')]
    pub allow_arns: Vec<String>,

    /// Domain of the STS endpoints, overrides the config file
    #[arg(long, env = "STS_DOMAIN")]
    pub sts_domain: Option<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct SignerArgs {
    /// YAML config file (region, profile)
    #[arg(short, long, env = "STS_AUTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// AWS region to sign for
    #[arg(short, long, env = "AWS_REGION")]
    pub region: Option<String>,

    /// AWS profile holding the source credentials
    #[arg(long, env = "AWS_PROFILE")]
    pub profile: Option<String>,

    /// Sign with the default credential chain instead of a GetSessionToken session
    #[arg(long)]
    pub ambient_credentials: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ClientCommand {
    /// URL of the protected server
    #[arg(short, long, env = "SERVER_URL", default_value = "http://localhost:8080/")]
    pub url: String,

    #[command(flatten)]
    pub signer: SignerArgs,
}

#[derive(Parser, Debug, Clone)]
pub struct WhoamiCommand {
    /// STS endpoint to verify against, defaults to the regional endpoint
    #[arg(long, env = "STS_ENDPOINT")]
    pub endpoint: Option<String>,

    #[command(flatten)]
    pub signer: SignerArgs,
}
