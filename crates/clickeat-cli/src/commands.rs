//! Subcommand handlers.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clickeat_core::models::{
    CategoryForm, DishForm, NewStaffMember, Photo, ProfileUpdate, Role, StaffUpdate,
};
use clickeat_core::{ApiClient, ApiError, AppConfig};
use tracing::info;

use crate::format::{dish_line, format_price, staff_line};

#[derive(clap::Subcommand)]
pub enum CategoryCommands {
    /// List all categories
    List,
    /// Create a category
    Add {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Rename a category
    Rename {
        #[arg(value_name = "ID")]
        id: u64,
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Delete a category
    Delete {
        #[arg(value_name = "ID")]
        id: u64,
    },
}

#[derive(clap::Subcommand)]
pub enum DishCommands {
    /// List dishes, optionally only one category
    List {
        #[arg(long, value_name = "CATEGORY_ID")]
        category: Option<u64>,
    },
    /// Show one dish with its ingredients
    Show {
        #[arg(value_name = "ID")]
        id: u64,
    },
    /// Create a dish
    Add {
        #[arg(long)]
        name: String,
        /// Decimal price, e.g. 150.00
        #[arg(long)]
        price: String,
        #[arg(long, value_name = "CATEGORY_ID")]
        category: u64,
        #[arg(long, default_value = "")]
        description: String,
        /// Image file to upload
        #[arg(long, value_name = "FILE")]
        photo: Option<PathBuf>,
        /// Create the dish hidden from the menu
        #[arg(long)]
        unavailable: bool,
    },
    /// Replace a dish's details
    Edit {
        #[arg(value_name = "ID")]
        id: u64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: String,
        #[arg(long, value_name = "CATEGORY_ID")]
        category: u64,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, value_name = "FILE")]
        photo: Option<PathBuf>,
        #[arg(long)]
        unavailable: bool,
    },
    /// Put a dish back on the menu
    Enable {
        #[arg(value_name = "ID")]
        id: u64,
    },
    /// Take a dish off the menu without deleting it
    Disable {
        #[arg(value_name = "ID")]
        id: u64,
    },
    /// Delete a dish
    Delete {
        #[arg(value_name = "ID")]
        id: u64,
    },
}

#[derive(clap::Subcommand)]
pub enum StaffCommands {
    /// List staff accounts
    List,
    /// Create a staff account (prompts for the password)
    Add {
        #[arg(long)]
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// manager, kitchen-staff or courier
        #[arg(long)]
        role: Role,
    },
    /// Change a staff member's role
    Role {
        #[arg(value_name = "ID")]
        id: u64,
        #[arg(value_name = "ROLE")]
        role: Role,
    },
    /// Re-enable a deactivated account
    Activate {
        #[arg(value_name = "ID")]
        id: u64,
    },
    /// Block an account from logging in
    Deactivate {
        #[arg(value_name = "ID")]
        id: u64,
    },
    /// Delete a staff account
    Delete {
        #[arg(value_name = "ID")]
        id: u64,
    },
}

// ============================================================================
// Session
// ============================================================================

pub async fn login(client: &ApiClient, app_config: &mut AppConfig, email: Option<String>) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt_email(app_config.last_email.as_deref())?,
    };
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;

    match client.login(&email, &password).await {
        Ok(_) => {}
        Err(ApiError::Unauthorized { .. }) => bail!("Invalid email or password"),
        Err(e) => return Err(e).context("Login failed"),
    }

    app_config.last_email = Some(email.clone());
    app_config.save()?;

    let profile = client.me().await?;
    info!(email = %email, "Login complete");
    println!("Logged in as {} ({})", profile.full_name(), profile.role);
    Ok(())
}

fn prompt_email(last_email: Option<&str>) -> Result<String> {
    match last_email {
        Some(last) => print!("Email [{}]: ", last),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let entered = line.trim();

    match (entered.is_empty(), last_email) {
        (false, _) => Ok(entered.to_string()),
        (true, Some(last)) => Ok(last.to_string()),
        (true, None) => bail!("Email is required"),
    }
}

pub async fn logout(client: &ApiClient) -> Result<()> {
    client.logout().await?;
    println!("Logged out");
    Ok(())
}

pub async fn whoami(client: &ApiClient) -> Result<()> {
    if !client.is_authenticated() {
        println!("Not logged in");
        return Ok(());
    }
    let profile = client.me().await?;
    println!("{} <{}>", profile.full_name(), profile.email);
    println!("Role: {}", profile.role);
    Ok(())
}

pub async fn change_password(client: &ApiClient) -> Result<()> {
    let password = rpassword::prompt_password("New password: ")?;
    let confirm = rpassword::prompt_password("Repeat new password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    let update = ProfileUpdate {
        password: Some(password),
        ..ProfileUpdate::default()
    };
    client.update_me(&update).await.map_err(field_errors)?;
    println!("Password changed");
    Ok(())
}

// ============================================================================
// Menu
// ============================================================================

/// Categories and dishes fetched together, dishes grouped under their
/// category.
pub async fn menu(client: &ApiClient) -> Result<()> {
    let (categories, dishes) =
        futures::try_join!(client.list_categories(), client.list_dishes(None))?;

    for category in &categories {
        let in_category: Vec<_> = dishes
            .iter()
            .filter(|d| d.category.id == category.id)
            .collect();
        if in_category.is_empty() {
            continue;
        }
        println!("{}", category.name);
        for dish in in_category {
            println!("{}", dish_line(dish));
        }
        println!();
    }
    Ok(())
}

pub async fn categories(client: &ApiClient, command: CategoryCommands) -> Result<()> {
    match command {
        CategoryCommands::List => {
            for category in client.list_categories().await? {
                println!("{:>4}  {:<24} {}", category.id, category.name, category.slug);
            }
        }
        CategoryCommands::Add { name } => {
            let category = client
                .create_category(&CategoryForm { name })
                .await
                .map_err(field_errors)?;
            println!("Created category {} ({})", category.name, category.id);
        }
        CategoryCommands::Rename { id, name } => {
            let category = client
                .update_category(id, &CategoryForm { name })
                .await
                .map_err(field_errors)?;
            println!("Renamed category {} to {}", id, category.name);
        }
        CategoryCommands::Delete { id } => {
            client.delete_category(id).await?;
            println!("Deleted category {}", id);
        }
    }
    Ok(())
}

pub async fn dishes(client: &ApiClient, command: DishCommands) -> Result<()> {
    match command {
        DishCommands::List { category } => {
            for dish in client.list_dishes(category).await? {
                println!("{}", dish_line(&dish));
            }
        }
        DishCommands::Show { id } => {
            let dish = client.get_dish(id).await?;
            println!("{} ({})", dish.name, format_price(&dish));
            println!("Category: {}", dish.category.name);
            if !dish.description.is_empty() {
                println!("{}", dish.description);
            }
            if let Some(url) = &dish.photo_url {
                println!("Photo: {}", url);
            }
            for ingredient in &dish.ingredients {
                let base = if ingredient.is_base_ingredient { "" } else { " (optional)" };
                println!("  - {}{}", ingredient.name, base);
            }
            if !dish.is_available {
                println!("Currently unavailable");
            }
        }
        DishCommands::Add {
            name,
            price,
            category,
            description,
            photo,
            unavailable,
        } => {
            let form = dish_form(name, price, category, description, photo, unavailable)?;
            let dish = client.create_dish(form).await.map_err(field_errors)?;
            println!("Created dish {} ({})", dish.name, dish.id);
        }
        DishCommands::Edit {
            id,
            name,
            price,
            category,
            description,
            photo,
            unavailable,
        } => {
            let form = dish_form(name, price, category, description, photo, unavailable)?;
            let dish = client.update_dish(id, form).await.map_err(field_errors)?;
            println!("Updated dish {}", dish.name);
        }
        DishCommands::Enable { id } => {
            let dish = client.set_dish_availability(id, true).await?;
            println!("{} is back on the menu", dish.name);
        }
        DishCommands::Disable { id } => {
            let dish = client.set_dish_availability(id, false).await?;
            println!("{} is off the menu", dish.name);
        }
        DishCommands::Delete { id } => {
            client.delete_dish(id).await?;
            println!("Deleted dish {}", id);
        }
    }
    Ok(())
}

fn dish_form(
    name: String,
    price: String,
    category_id: u64,
    description: String,
    photo: Option<PathBuf>,
    unavailable: bool,
) -> Result<DishForm> {
    let photo = photo
        .map(|path| {
            Photo::load(&path).with_context(|| format!("Failed to read photo {}", path.display()))
        })
        .transpose()?;
    Ok(DishForm {
        name,
        description,
        price,
        is_available: !unavailable,
        category_id,
        photo,
    })
}

// ============================================================================
// Staff
// ============================================================================

pub async fn staff(client: &ApiClient, command: StaffCommands) -> Result<()> {
    match command {
        StaffCommands::List => {
            for member in client.list_staff().await? {
                println!("{}", staff_line(&member));
            }
        }
        StaffCommands::Add {
            email,
            first_name,
            last_name,
            role,
        } => {
            let password = rpassword::prompt_password("Initial password: ")?;
            let member = NewStaffMember {
                email,
                first_name,
                last_name,
                password,
                role,
            };
            let created = client.create_staff(&member).await.map_err(field_errors)?;
            println!("Created {} ({})", created.full_name(), created.id);
        }
        StaffCommands::Role { id, role } => {
            let update = StaffUpdate {
                role: Some(role),
                is_active: None,
            };
            let member = client.update_staff(id, &update).await.map_err(field_errors)?;
            println!("{} is now {}", member.full_name(), member.role);
        }
        StaffCommands::Activate { id } => set_active(client, id, true).await?,
        StaffCommands::Deactivate { id } => set_active(client, id, false).await?,
        StaffCommands::Delete { id } => {
            client.delete_staff(id).await?;
            println!("Deleted staff account {}", id);
        }
    }
    Ok(())
}

async fn set_active(client: &ApiClient, id: u64, active: bool) -> Result<()> {
    let update = StaffUpdate {
        role: None,
        is_active: Some(active),
    };
    let member = client.update_staff(id, &update).await?;
    let state = if member.is_active { "active" } else { "inactive" };
    println!("{} is now {}", member.full_name(), state);
    Ok(())
}

/// Spell out per-field validation messages from a 400.
fn field_errors(err: ApiError) -> anyhow::Error {
    let fields = err.field_errors();
    if fields.is_empty() {
        return err.into();
    }
    let details: Vec<String> = fields
        .into_iter()
        .map(|(field, message)| format!("  {}: {}", field, message))
        .collect();
    anyhow::Error::new(err).context(format!("Validation failed:\n{}", details.join("\n")))
}
