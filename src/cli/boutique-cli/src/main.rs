//! Boutique CLI - Command line interface.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "boutique")]
#[command(about = "Boutique CLI - Manage accounts and the product catalogue")]
#[command(version)]
struct Cli {
    /// Boutique server address
    #[arg(long, default_value = "http://localhost:8080", env = "BOUTIQUE_ADDR")]
    addr: String,

    /// Bearer token
    #[arg(long, env = "BOUTIQUE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server status
    Status,
    /// Create an account
    Signup {
        /// Username
        username: String,
        /// Email
        email: String,
        /// Password (or read from stdin if not provided)
        #[arg(long)]
        password: Option<String>,
        /// Requested role (USER unless the server runs in dev mode)
        #[arg(long)]
        role: Option<String>,
    },
    /// Log in and print a token
    Login {
        /// Username or email
        username: String,
        /// Password (or read from stdin if not provided)
        #[arg(long)]
        password: Option<String>,
    },
    /// Show the current user
    Whoami,
    /// Change the current user's password
    Passwd {
        /// Current password
        #[arg(long)]
        current: String,
        /// New password
        #[arg(long)]
        new: String,
    },
    /// User administration
    Users {
        #[command(subcommand)]
        command: UsersCommands,
    },
    /// Product catalogue
    Products {
        #[command(subcommand)]
        command: ProductsCommands,
    },
}

#[derive(Subcommand)]
enum UsersCommands {
    /// List users
    List,
    /// Change a user's role
    SetRole {
        /// Username
        username: String,
        /// New role (USER, MODERATOR, ADMIN)
        role: String,
    },
}

#[derive(Subcommand)]
enum ProductsCommands {
    /// List products
    List,
    /// Create a product
    Create {
        /// Product name
        name: String,
        /// Unit price in cents
        #[arg(long)]
        price_cents: i64,
        /// Initial stock
        #[arg(long, default_value = "0")]
        stock: u32,
        /// Description
        #[arg(long)]
        description: Option<String>,
        /// Category
        #[arg(long)]
        category: Option<String>,
    },
    /// Replace a product's details
    Update {
        /// Product id
        id: String,
        /// Product name
        name: String,
        /// Unit price in cents
        #[arg(long)]
        price_cents: i64,
        /// Stock
        #[arg(long, default_value = "0")]
        stock: u32,
        /// Description
        #[arg(long)]
        description: Option<String>,
        /// Category
        #[arg(long)]
        category: Option<String>,
    },
    /// Delete a product
    Delete {
        /// Product id
        id: String,
    },
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    message: String,
    status: u16,
}

#[derive(Serialize)]
struct SignupRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    expires_in: u64,
    user: UserView,
}

#[derive(Debug, Deserialize)]
struct UserView {
    username: String,
    email: String,
    role: String,
}

#[derive(Serialize)]
struct SetRoleRequest<'a> {
    role: &'a str,
}

#[derive(Serialize)]
struct NewProduct<'a> {
    name: &'a str,
    price_cents: i64,
    stock: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<&'a str>,
}

#[derive(Serialize)]
struct ChangePasswordRequest<'a> {
    current_password: &'a str,
    new_password: &'a str,
}

#[derive(Debug, Deserialize)]
struct Product {
    id: String,
    name: String,
    price_cents: i64,
    stock: u32,
    #[serde(default)]
    category: Option<String>,
}

// ============================================================================
// HTTP Client
// ============================================================================

struct BoutiqueClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl BoutiqueClient {
    fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self
            .token
            .as_ref()
            .context("Authentication token required. Set BOUTIQUE_TOKEN or use --token")?;

        Ok(self.request(method, path).bearer_auth(token))
    }

    async fn send(req: RequestBuilder, action: &str) -> Result<Response> {
        let resp = req.send().await.context("Failed to connect to server")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error: ErrorResponse = resp.json().await.unwrap_or(ErrorResponse {
                message: "Unknown error".into(),
                status: status.as_u16(),
            });
            bail!("{} failed ({}): {}", action, error.status, error.message);
        }

        Ok(resp)
    }

    async fn json<T: DeserializeOwned>(req: RequestBuilder, action: &str) -> Result<T> {
        Self::send(req, action)
            .await?
            .json()
            .await
            .context("Failed to parse response")
    }

    async fn get_health(&self) -> Result<HealthResponse> {
        Self::json(self.request(Method::GET, "/health"), "Health check").await
    }

    async fn signup(&self, req: &SignupRequest<'_>) -> Result<UserView> {
        Self::json(self.request(Method::POST, "/user/signup").json(req), "Signup").await
    }

    async fn login(&self, req: &LoginRequest<'_>) -> Result<LoginResponse> {
        Self::json(self.request(Method::POST, "/user/login").json(req), "Login").await
    }

    async fn whoami(&self) -> Result<UserView> {
        Self::json(self.authed(Method::GET, "/users/me")?, "Whoami").await
    }

    async fn users_list(&self) -> Result<Vec<UserView>> {
        Self::json(self.authed(Method::GET, "/users")?, "List users").await
    }

    async fn users_set_role(&self, username: &str, role: &str) -> Result<UserView> {
        let req = self
            .authed(Method::PUT, &format!("/users/{}/role", username))?
            .json(&SetRoleRequest { role });
        Self::json(req, "Set role").await
    }

    async fn products_list(&self) -> Result<Vec<Product>> {
        Self::json(self.authed(Method::GET, "/products")?, "List products").await
    }

    async fn products_create(&self, product: &NewProduct<'_>) -> Result<Product> {
        let req = self.authed(Method::POST, "/products")?.json(product);
        Self::json(req, "Create product").await
    }

    async fn products_update(&self, id: &str, product: &NewProduct<'_>) -> Result<Product> {
        let req = self
            .authed(Method::PUT, &format!("/products/{}", id))?
            .json(product);
        Self::json(req, "Update product").await
    }

    async fn change_password(&self, current: &str, new: &str) -> Result<()> {
        let req = self
            .authed(Method::PUT, "/users/me/password")?
            .json(&ChangePasswordRequest {
                current_password: current,
                new_password: new,
            });
        Self::send(req, "Change password").await?;
        Ok(())
    }

    async fn products_delete(&self, id: &str) -> Result<()> {
        let req = self.authed(Method::DELETE, &format!("/products/{}", id))?;
        Self::send(req, "Delete product").await?;
        Ok(())
    }
}

// ============================================================================
// Command Handlers
// ============================================================================

fn read_password(password: Option<String>) -> Result<String> {
    let password = match password {
        Some(p) => p,
        None => {
            print!("Password: ");
            io::stdout().flush()?;
            let stdin = io::stdin();
            let mut line = String::new();
            stdin.lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        },
    };

    if password.is_empty() {
        bail!("Password cannot be empty");
    }

    Ok(password)
}

fn format_price(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

async fn cmd_status(client: &BoutiqueClient) -> Result<()> {
    let health = client.get_health().await?;

    println!("Boutique server status:");
    println!("  Status:  {}", health.status);
    println!("  Version: {}", health.version);

    Ok(())
}

async fn cmd_signup(
    client: &BoutiqueClient,
    username: &str,
    email: &str,
    password: Option<String>,
    role: Option<&str>,
) -> Result<()> {
    let password = read_password(password)?;
    let user = client
        .signup(&SignupRequest {
            username,
            email,
            password: &password,
            role,
        })
        .await?;

    println!("Account '{}' created with role {}", user.username, user.role);
    Ok(())
}

async fn cmd_login(client: &BoutiqueClient, username: &str, password: Option<String>) -> Result<()> {
    let password = read_password(password)?;
    let result = client
        .login(&LoginRequest {
            username,
            password: &password,
        })
        .await?;

    eprintln!(
        "Logged in as {} ({}), token valid for {}s",
        result.user.username, result.user.role, result.expires_in
    );
    println!("{}", result.token);

    Ok(())
}

async fn cmd_whoami(client: &BoutiqueClient) -> Result<()> {
    let user = client.whoami().await?;

    println!("Username: {}", user.username);
    println!("Email:    {}", user.email);
    println!("Role:     {}", user.role);

    Ok(())
}

async fn cmd_users_list(client: &BoutiqueClient) -> Result<()> {
    let users = client.users_list().await?;

    if users.is_empty() {
        println!("No users found");
    } else {
        println!("Users:");
        for user in &users {
            println!("  {:<24} {:<10} {}", user.username, user.role, user.email);
        }
    }

    Ok(())
}

async fn cmd_users_set_role(client: &BoutiqueClient, username: &str, role: &str) -> Result<()> {
    let user = client.users_set_role(username, role).await?;
    println!("User '{}' now has role {}", user.username, user.role);
    Ok(())
}

async fn cmd_products_list(client: &BoutiqueClient) -> Result<()> {
    let products = client.products_list().await?;

    if products.is_empty() {
        println!("No products found");
    } else {
        println!("Products:");
        for p in &products {
            println!(
                "  {}  {:<24} {:<12} {:>10}  stock {}",
                p.id,
                p.name,
                p.category.as_deref().unwrap_or("-"),
                format_price(p.price_cents),
                p.stock
            );
        }
    }

    Ok(())
}

async fn cmd_products_create(client: &BoutiqueClient, product: NewProduct<'_>) -> Result<()> {
    let created = client.products_create(&product).await?;
    println!("Product '{}' created with id {}", created.name, created.id);
    Ok(())
}

async fn cmd_products_update(
    client: &BoutiqueClient,
    id: &str,
    product: NewProduct<'_>,
) -> Result<()> {
    let updated = client.products_update(id, &product).await?;
    println!("Product '{}' updated", updated.id);
    Ok(())
}

async fn cmd_passwd(client: &BoutiqueClient, current: &str, new: &str) -> Result<()> {
    client.change_password(current, new).await?;
    println!("Password changed");
    Ok(())
}

async fn cmd_products_delete(client: &BoutiqueClient, id: &str) -> Result<()> {
    client.products_delete(id).await?;
    println!("Product '{}' deleted", id);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = BoutiqueClient::new(&cli.addr, cli.token)?;

    match cli.command {
        Commands::Status => cmd_status(&client).await,
        Commands::Signup {
            username,
            email,
            password,
            role,
        } => cmd_signup(&client, &username, &email, password, role.as_deref()).await,
        Commands::Login { username, password } => cmd_login(&client, &username, password).await,
        Commands::Whoami => cmd_whoami(&client).await,
        Commands::Passwd { current, new } => cmd_passwd(&client, &current, &new).await,
        Commands::Users { command } => match command {
            UsersCommands::List => cmd_users_list(&client).await,
            UsersCommands::SetRole { username, role } => {
                cmd_users_set_role(&client, &username, &role).await
            },
        },
        Commands::Products { command } => match command {
            ProductsCommands::List => cmd_products_list(&client).await,
            ProductsCommands::Create {
                name,
                price_cents,
                stock,
                description,
                category,
            } => {
                let product = NewProduct {
                    name: &name,
                    price_cents,
                    stock,
                    description: description.as_deref(),
                    category: category.as_deref(),
                };
                cmd_products_create(&client, product).await
            },
            ProductsCommands::Update {
                id,
                name,
                price_cents,
                stock,
                description,
                category,
            } => {
                let product = NewProduct {
                    name: &name,
                    price_cents,
                    stock,
                    description: description.as_deref(),
                    category: category.as_deref(),
                };
                cmd_products_update(&client, &id, product).await
            },
            ProductsCommands::Delete { id } => cmd_products_delete(&client, &id).await,
        },
    }
}
