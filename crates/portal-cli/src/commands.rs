//! Subcommands and their execution against a [`Portal`].

use std::{path::PathBuf, time::Duration};

use anyhow::{Context as _, Result, bail};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use portal_client::{GateDecision, Portal, View};
use portal_core::{
  Patch,
  branch::{BranchUpdate, NewBranch},
  company::{CompanyUpdate, NewCompany, NewSpecification, SpecificationChange},
  document::{FileUpload, NewDocument},
  event::{CalendarEventUpdate, NewCalendarEvent},
  gateway::{Gateway, IdentityMetadata, Row, Table},
  id::parse_id,
  news::{NewNews, NewsUpdate},
  notification::{NewNotification, NotificationKind},
  product::{NewProduct, NewProductCategory, ProductStatus, ProductUpdate},
  user::{NewUser, Role, UserType, UserUpdate},
};
use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

/// How long to wait for the profile after signing in.
const PROFILE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Sign in with email and password.
  SignIn {
    #[arg(long)]
    email:    String,
    #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
    password: String,
  },
  SignOut,
  /// Show the signed-in profile.
  Whoami,
  /// Provision an administrator directly through the backend. Used once to
  /// seed an empty installation.
  Bootstrap {
    #[arg(long)]
    name:     String,
    #[arg(long)]
    email:    String,
    #[arg(long, env = "PORTAL_PASSWORD", hide_env_values = true)]
    password: String,
  },
  /// Decide whether the signed-in user may open a view, e.g. `users` or
  /// `company_detail:<id>`.
  Gate { view: String },
  #[command(subcommand)]
  Users(UserCommand),
  #[command(subcommand)]
  Branches(BranchCommand),
  #[command(subcommand)]
  Companies(CompanyCommand),
  #[command(subcommand)]
  Products(ProductCommand),
  #[command(subcommand)]
  Documents(DocumentCommand),
  #[command(subcommand)]
  News(NewsCommand),
  #[command(subcommand)]
  Events(EventCommand),
  /// In-memory notifications; only useful inside `shell`.
  #[command(subcommand)]
  Notifications(NotificationCommand),
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum UserCommand {
  List,
  Get { id: String },
  Create(NewUserArgs),
  Update {
    id:     String,
    #[command(flatten)]
    fields: UserPatchArgs,
  },
  Delete { id: String },
}

#[derive(Args, Debug)]
pub struct NewUserArgs {
  #[arg(long)]
  name:           String,
  #[arg(long)]
  email:          String,
  #[arg(long, env = "PORTAL_NEW_USER_PASSWORD", hide_env_values = true)]
  password:       String,
  #[arg(long)]
  role:           Role,
  /// Job category, e.g. "Delegación".
  #[arg(long = "type")]
  user_type:      UserType,
  #[arg(long, value_parser = parse_id_arg)]
  branch:         Option<Uuid>,
  #[arg(long)]
  avatar:         Option<String>,
  #[arg(long)]
  position:       Option<String>,
  #[arg(long)]
  extension:      Option<String>,
  #[arg(long)]
  social_contact: Option<String>,
}

/// Omitted flags leave a field unchanged; an empty value clears it.
#[derive(Args, Debug)]
pub struct UserPatchArgs {
  #[arg(long)]
  name:           Option<String>,
  #[arg(long)]
  email:          Option<String>,
  #[arg(long)]
  role:           Option<Role>,
  #[arg(long = "type")]
  user_type:      Option<UserType>,
  #[arg(long)]
  branch:         Option<String>,
  #[arg(long)]
  avatar:         Option<String>,
  #[arg(long)]
  position:       Option<String>,
  #[arg(long)]
  extension:      Option<String>,
  #[arg(long)]
  social_contact: Option<String>,
}

// ─── Branches ────────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum BranchCommand {
  List,
  Get { id: String },
  Create(NewBranchArgs),
  Update {
    id:     String,
    #[command(flatten)]
    fields: BranchPatchArgs,
  },
  Delete { id: String },
}

#[derive(Args, Debug)]
pub struct NewBranchArgs {
  #[arg(long)]
  name:           String,
  #[arg(long)]
  address:        String,
  #[arg(long)]
  postal_code:    String,
  #[arg(long)]
  city:           String,
  #[arg(long)]
  province:       String,
  #[arg(long)]
  contact_person: String,
  #[arg(long)]
  email:          String,
  #[arg(long)]
  phone:          Option<String>,
  #[arg(long)]
  website:        Option<String>,
}

#[derive(Args, Debug)]
pub struct BranchPatchArgs {
  #[arg(long)]
  name:           Option<String>,
  #[arg(long)]
  address:        Option<String>,
  #[arg(long)]
  postal_code:    Option<String>,
  #[arg(long)]
  city:           Option<String>,
  #[arg(long)]
  province:       Option<String>,
  #[arg(long)]
  contact_person: Option<String>,
  #[arg(long)]
  email:          Option<String>,
  #[arg(long)]
  phone:          Option<String>,
  #[arg(long)]
  website:        Option<String>,
}

// ─── Companies ───────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum CompanyCommand {
  List,
  /// One company with its specifications.
  Get { id: String },
  Create {
    #[arg(long)]
    name:             String,
    #[arg(long)]
    logo:             Option<String>,
    #[arg(long)]
    website:          Option<String>,
    #[arg(long)]
    agent_access_url: Option<String>,
    #[arg(long)]
    contact_email:    Option<String>,
    #[arg(long)]
    classification:   Option<String>,
    /// `CATEGORY=CONTENT`; repeatable.
    #[arg(long = "spec", value_parser = parse_spec)]
    specs:            Vec<NewSpecification>,
  },
  Update {
    id:               String,
    #[arg(long)]
    name:             Option<String>,
    #[arg(long)]
    logo:             Option<String>,
    #[arg(long)]
    website:          Option<String>,
    #[arg(long)]
    agent_access_url: Option<String>,
    #[arg(long)]
    contact_email:    Option<String>,
    #[arg(long)]
    classification:   Option<String>,
    /// `CATEGORY=CONTENT`; repeatable.
    #[arg(long = "add-spec", value_parser = parse_spec)]
    add_specs:        Vec<NewSpecification>,
    /// `ID=CATEGORY=CONTENT`; repeatable.
    #[arg(long = "edit-spec", value_parser = parse_spec_edit)]
    edit_specs:       Vec<SpecificationChange>,
    #[arg(long = "remove-spec", value_parser = parse_id_arg)]
    remove_specs:     Vec<Uuid>,
  },
  Delete { id: String },
}

// ─── Products ────────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum ProductCommand {
  List,
  Get { id: String },
  Create {
    #[arg(long)]
    name:        String,
    #[arg(long, value_parser = parse_id_arg)]
    category:    Uuid,
    #[arg(long, value_parser = parse_id_arg)]
    subcategory: Option<Uuid>,
    #[arg(long, value_parser = parse_id_arg)]
    company:     Uuid,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, default_value = "draft")]
    status:      ProductStatus,
    #[arg(long = "tag")]
    tags:        Vec<String>,
  },
  Update {
    id:          String,
    #[arg(long)]
    name:        Option<String>,
    #[arg(long, value_parser = parse_id_arg)]
    category:    Option<Uuid>,
    #[arg(long)]
    subcategory: Option<String>,
    #[arg(long, value_parser = parse_id_arg)]
    company:     Option<Uuid>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    status:      Option<ProductStatus>,
    /// Comma-separated; an empty value clears the tags.
    #[arg(long)]
    tags:        Option<String>,
  },
  Delete { id: String },
  Categories,
  /// Categories nested under their parents.
  CategoryTree,
  CreateCategory {
    #[arg(long)]
    name:   String,
    #[arg(long, value_parser = parse_id_arg)]
    parent: Option<Uuid>,
  },
}

// ─── Documents ───────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum DocumentCommand {
  List,
  Get { id: String },
  /// Upload a file and record its metadata.
  Upload {
    file:                PathBuf,
    #[arg(long)]
    title:               String,
    #[arg(long)]
    description:         Option<String>,
    #[arg(long)]
    category:            String,
    #[arg(long, value_parser = parse_id_arg)]
    company:             Option<Uuid>,
    #[arg(long, value_parser = parse_id_arg)]
    product_category:    Option<Uuid>,
    #[arg(long, value_parser = parse_id_arg)]
    product_subcategory: Option<Uuid>,
    #[arg(long, value_parser = parse_id_arg)]
    product:             Option<Uuid>,
    #[arg(long = "tag")]
    tags:                Vec<String>,
    /// Guessed from the file extension when omitted.
    #[arg(long)]
    content_type:        Option<String>,
  },
  Delete { id: String },
}

// ─── News ────────────────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum NewsCommand {
  List,
  Get { id: String },
  Create {
    #[arg(long)]
    title:       String,
    #[arg(long)]
    content:     String,
    #[arg(long)]
    excerpt:     Option<String>,
    #[arg(long)]
    featured:    bool,
    #[arg(long)]
    cover_image: Option<String>,
    #[arg(long)]
    category:    String,
    #[arg(long, value_parser = parse_id_arg)]
    company:     Option<Uuid>,
    #[arg(long = "tag")]
    tags:        Vec<String>,
  },
  Update {
    id:          String,
    #[arg(long)]
    title:       Option<String>,
    #[arg(long)]
    content:     Option<String>,
    #[arg(long)]
    excerpt:     Option<String>,
    #[arg(long)]
    featured:    Option<bool>,
    #[arg(long)]
    cover_image: Option<String>,
    #[arg(long)]
    category:    Option<String>,
    #[arg(long)]
    company:     Option<String>,
    /// Comma-separated; an empty value clears the tags.
    #[arg(long)]
    tags:        Option<String>,
  },
  Delete { id: String },
}

// ─── Calendar events ─────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum EventCommand {
  /// The signed-in user's events, soonest first.
  List,
  Create {
    #[arg(long)]
    title:       String,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    location:    Option<String>,
    /// RFC 3339, e.g. 2024-05-01T09:00:00Z.
    #[arg(long)]
    start:       DateTime<Utc>,
    #[arg(long)]
    end:         DateTime<Utc>,
    #[arg(long)]
    category:    String,
  },
  Update {
    id:          String,
    #[arg(long)]
    title:       Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    location:    Option<String>,
    #[arg(long)]
    start:       Option<DateTime<Utc>>,
    #[arg(long)]
    end:         Option<DateTime<Utc>>,
    #[arg(long)]
    category:    Option<String>,
  },
  Delete { id: String },
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[derive(Subcommand, Debug)]
pub enum NotificationCommand {
  List,
  Unread,
  Add {
    #[arg(long, default_value = "system")]
    kind:    NotificationKind,
    #[arg(long)]
    title:   String,
    #[arg(long)]
    message: String,
    #[arg(long)]
    link:    Option<String>,
  },
  Read {
    #[arg(value_parser = parse_id_arg)]
    id: Uuid,
  },
  ReadAll,
}

// ─── Argument helpers ────────────────────────────────────────────────────────

/// Ids on the command line follow the same canonical form as everywhere
/// else: lowercase and hyphenated.
fn parse_id_arg(raw: &str) -> Result<Uuid, String> {
  parse_id(raw).map_err(|e| e.to_string())
}

fn parse_spec(raw: &str) -> Result<NewSpecification, String> {
  let (category, content) = raw
    .split_once('=')
    .ok_or_else(|| format!("expected CATEGORY=CONTENT, got {raw:?}"))?;
  Ok(NewSpecification {
    category: category.trim().to_owned(),
    content:  content.trim().to_owned(),
  })
}

fn parse_spec_edit(raw: &str) -> Result<SpecificationChange, String> {
  let (id, rest) = raw
    .split_once('=')
    .ok_or_else(|| format!("expected ID=CATEGORY=CONTENT, got {raw:?}"))?;
  let id = parse_id_arg(id.trim())?;
  let spec = parse_spec(rest)?;
  Ok(SpecificationChange::Edit { id, category: spec.category, content: spec.content })
}

/// `None` keeps the field, an empty value clears it.
fn patch(value: Option<String>) -> Patch<String> {
  match value {
    None => Patch::Keep,
    Some(v) if v.trim().is_empty() => Patch::Clear,
    Some(v) => Patch::Set(v),
  }
}

fn patch_id(value: Option<String>) -> Result<Patch<Uuid>> {
  Ok(match patch(value) {
    Patch::Set(raw) => {
      Patch::Set(parse_id(raw.trim()).with_context(|| format!("bad id {raw:?}"))?)
    }
    Patch::Clear => Patch::Clear,
    Patch::Keep => Patch::Keep,
  })
}

fn patch_tags(value: Option<String>) -> Patch<Vec<String>> {
  patch(value).map(|raw| {
    raw
      .split(',')
      .map(str::trim)
      .filter(|tag| !tag.is_empty())
      .map(str::to_owned)
      .collect()
  })
}

fn parse_view(raw: &str) -> Result<View> {
  let value = match raw.split_once(':') {
    Some((name, id)) => json!({ "view": name, "id": parse_id(id)? }),
    None => json!({ "view": raw }),
  };
  serde_json::from_value(value).with_context(|| format!("unknown view {raw:?}"))
}

fn content_type_for(path: &std::path::Path) -> &'static str {
  let extension = path
    .extension()
    .and_then(|e| e.to_str())
    .map(str::to_ascii_lowercase);
  match extension.as_deref() {
    Some("pdf") => "application/pdf",
    Some("doc") => "application/msword",
    Some("docx") => {
      "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    }
    Some("xls") => "application/vnd.ms-excel",
    Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    Some("png") => "image/png",
    Some("jpg" | "jpeg") => "image/jpeg",
    Some("txt") => "text/plain",
    _ => "application/octet-stream",
  }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

// ─── Execution ───────────────────────────────────────────────────────────────

pub async fn run<G: Gateway + 'static>(portal: &Portal<G>, command: Command) -> Result<()> {
  match command {
    Command::SignIn { email, password } => {
      let session = portal.session().sign_in(&email, &password).await?;
      let user = portal
        .session()
        .wait_for_profile(session.user_id, PROFILE_TIMEOUT)
        .await?;
      print(&user)
    }
    Command::SignOut => Ok(portal.session().sign_out().await?),
    Command::Whoami => match portal.session().current_user() {
      Some(user) => print(&user),
      None => bail!("not signed in"),
    },
    Command::Bootstrap { name, email, password } => bootstrap(portal, name, email, password).await,
    Command::Gate { view } => {
      let view = parse_view(&view)?;
      match portal.gate(&view) {
        GateDecision::Allow => println!("allow"),
        GateDecision::Wait => println!("wait"),
        GateDecision::Redirect(to) => println!("redirect {}", serde_json::to_string(&to)?),
      }
      Ok(())
    }
    Command::Users(cmd) => users(portal, cmd).await,
    Command::Branches(cmd) => branches(portal, cmd).await,
    Command::Companies(cmd) => companies(portal, cmd).await,
    Command::Products(cmd) => products(portal, cmd).await,
    Command::Documents(cmd) => documents(portal, cmd).await,
    Command::News(cmd) => news(portal, cmd).await,
    Command::Events(cmd) => events(portal, cmd).await,
    Command::Notifications(cmd) => notifications(portal, cmd),
  }
}

async fn bootstrap<G: Gateway + 'static>(
  portal: &Portal<G>,
  name: String,
  email: String,
  password: String,
) -> Result<()> {
  let metadata = IdentityMetadata {
    name:      name.clone(),
    role:      Role::Admin,
    user_type: UserType::Administrator,
  };
  let id = portal
    .gateway()
    .create_identity(email.clone(), password, metadata)
    .await
    .context("creating identity")?;

  let mut row = Row::new();
  row.insert("id".into(), Value::String(id.to_string()));
  row.insert("name".into(), Value::String(name));
  row.insert("email".into(), Value::String(email));
  row.insert("role".into(), Value::String(Role::Admin.to_string()));
  row.insert("type".into(), Value::String(UserType::Administrator.to_string()));
  let stored = portal
    .gateway()
    .insert(Table::Users, row)
    .await
    .context("creating profile")?;

  tracing::info!(%id, "administrator provisioned");
  print(&stored)
}

async fn users<G: Gateway + 'static>(portal: &Portal<G>, cmd: UserCommand) -> Result<()> {
  let repo = portal.users();
  match cmd {
    UserCommand::List => print(&repo.list().await?),
    UserCommand::Get { id } => print(&repo.get(&id).await?),
    UserCommand::Create(args) => {
      let new = NewUser {
        name:           args.name,
        email:          args.email,
        password:       args.password,
        role:           args.role,
        user_type:      args.user_type,
        avatar:         args.avatar,
        branch_id:      args.branch,
        position:       args.position,
        extension:      args.extension,
        social_contact: args.social_contact,
      };
      print(&repo.create(new).await?)
    }
    UserCommand::Update { id, fields } => {
      let update = UserUpdate {
        name:           fields.name,
        email:          fields.email,
        role:           fields.role,
        user_type:      fields.user_type,
        branch_id:      patch_id(fields.branch)?,
        avatar:         patch(fields.avatar),
        position:       patch(fields.position),
        extension:      patch(fields.extension),
        social_contact: patch(fields.social_contact),
      };
      Ok(repo.update(&id, update).await?)
    }
    UserCommand::Delete { id } => Ok(repo.delete(&id).await?),
  }
}

async fn branches<G: Gateway + 'static>(portal: &Portal<G>, cmd: BranchCommand) -> Result<()> {
  let repo = portal.branches();
  match cmd {
    BranchCommand::List => print(&repo.list().await?),
    BranchCommand::Get { id } => print(&repo.get(&id).await?),
    BranchCommand::Create(args) => {
      let new = NewBranch {
        name:           args.name,
        address:        args.address,
        postal_code:    args.postal_code,
        city:           args.city,
        province:       args.province,
        contact_person: args.contact_person,
        email:          args.email,
        phone:          args.phone,
        website:        args.website,
      };
      print(&repo.create(new).await?)
    }
    BranchCommand::Update { id, fields } => {
      let update = BranchUpdate {
        name:           fields.name,
        address:        fields.address,
        postal_code:    fields.postal_code,
        city:           fields.city,
        province:       fields.province,
        contact_person: fields.contact_person,
        email:          fields.email,
        phone:          patch(fields.phone),
        website:        patch(fields.website),
      };
      Ok(repo.update(&id, update).await?)
    }
    BranchCommand::Delete { id } => Ok(repo.delete(&id).await?),
  }
}

async fn companies<G: Gateway + 'static>(portal: &Portal<G>, cmd: CompanyCommand) -> Result<()> {
  let repo = portal.companies();
  match cmd {
    CompanyCommand::List => print(&repo.list().await?),
    CompanyCommand::Get { id } => print(&repo.get(&id).await?),
    CompanyCommand::Create {
      name,
      logo,
      website,
      agent_access_url,
      contact_email,
      classification,
      specs,
    } => {
      let new = NewCompany {
        name,
        logo,
        website,
        agent_access_url,
        contact_email,
        classification,
        specifications: specs,
      };
      print(&repo.create(new).await?)
    }
    CompanyCommand::Update {
      id,
      name,
      logo,
      website,
      agent_access_url,
      contact_email,
      classification,
      add_specs,
      edit_specs,
      remove_specs,
    } => {
      let specifications = add_specs
        .into_iter()
        .map(SpecificationChange::Add)
        .chain(edit_specs)
        .chain(remove_specs.into_iter().map(SpecificationChange::Remove))
        .collect();
      let update = CompanyUpdate {
        name,
        logo: patch(logo),
        website: patch(website),
        agent_access_url: patch(agent_access_url),
        contact_email: patch(contact_email),
        classification: patch(classification),
        specifications,
      };
      Ok(repo.update(&id, update).await?)
    }
    CompanyCommand::Delete { id } => Ok(repo.delete(&id).await?),
  }
}

async fn products<G: Gateway + 'static>(portal: &Portal<G>, cmd: ProductCommand) -> Result<()> {
  let repo = portal.products();
  match cmd {
    ProductCommand::List => print(&repo.list().await?),
    ProductCommand::Get { id } => print(&repo.get(&id).await?),
    ProductCommand::Create {
      name,
      category,
      subcategory,
      company,
      description,
      status,
      tags,
    } => {
      let new = NewProduct {
        name,
        category_id: category,
        subcategory_id: subcategory,
        company_id: company,
        description,
        status,
        tags,
      };
      print(&repo.create(new).await?)
    }
    ProductCommand::Update {
      id,
      name,
      category,
      subcategory,
      company,
      description,
      status,
      tags,
    } => {
      let update = ProductUpdate {
        name,
        category_id: category,
        subcategory_id: patch_id(subcategory)?,
        company_id: company,
        description: patch(description),
        status,
        tags: patch_tags(tags),
      };
      Ok(repo.update(&id, update).await?)
    }
    ProductCommand::Delete { id } => Ok(repo.delete(&id).await?),
    ProductCommand::Categories => print(&repo.categories().await?),
    ProductCommand::CategoryTree => print(&repo.category_tree().await?),
    ProductCommand::CreateCategory { name, parent } => {
      let new = NewProductCategory { name, parent_id: parent };
      print(&repo.create_category(new).await?)
    }
  }
}

async fn documents<G: Gateway + 'static>(
  portal: &Portal<G>,
  cmd: DocumentCommand,
) -> Result<()> {
  let repo = portal.documents();
  match cmd {
    DocumentCommand::List => print(&repo.list().await?),
    DocumentCommand::Get { id } => print(&repo.get(&id).await?),
    DocumentCommand::Upload {
      file,
      title,
      description,
      category,
      company,
      product_category,
      product_subcategory,
      product,
      tags,
      content_type,
    } => {
      let bytes = tokio::fs::read(&file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
      let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_owned());
      let upload = FileUpload {
        content_type: content_type.unwrap_or_else(|| content_type_for(&file).to_owned()),
        file_name,
        bytes: Bytes::from(bytes),
      };
      let new = NewDocument {
        title,
        description,
        category_id: category,
        company_id: company,
        product_category_id: product_category,
        product_subcategory_id: product_subcategory,
        product_id: product,
        tags,
      };
      print(&repo.create(new, upload).await?)
    }
    DocumentCommand::Delete { id } => Ok(repo.delete(&id).await?),
  }
}

async fn news<G: Gateway + 'static>(portal: &Portal<G>, cmd: NewsCommand) -> Result<()> {
  let repo = portal.news();
  match cmd {
    NewsCommand::List => print(&repo.list().await?),
    NewsCommand::Get { id } => print(&repo.get(&id).await?),
    NewsCommand::Create {
      title,
      content,
      excerpt,
      featured,
      cover_image,
      category,
      company,
      tags,
    } => {
      let new = NewNews {
        title,
        content,
        excerpt,
        featured,
        cover_image,
        category,
        company_id: company,
        tags,
      };
      print(&repo.create(new).await?)
    }
    NewsCommand::Update {
      id,
      title,
      content,
      excerpt,
      featured,
      cover_image,
      category,
      company,
      tags,
    } => {
      let update = NewsUpdate {
        title,
        content,
        excerpt: patch(excerpt),
        featured,
        cover_image: patch(cover_image),
        category,
        company_id: patch_id(company)?,
        tags: patch_tags(tags),
      };
      Ok(repo.update(&id, update).await?)
    }
    NewsCommand::Delete { id } => Ok(repo.delete(&id).await?),
  }
}

async fn events<G: Gateway + 'static>(portal: &Portal<G>, cmd: EventCommand) -> Result<()> {
  let repo = portal.events();
  match cmd {
    EventCommand::List => print(&repo.list().await?),
    EventCommand::Create {
      title,
      description,
      location,
      start,
      end,
      category,
    } => {
      let new = NewCalendarEvent {
        title,
        description,
        location,
        start_date: start,
        end_date: end,
        category,
      };
      print(&repo.create(new).await?)
    }
    EventCommand::Update {
      id,
      title,
      description,
      location,
      start,
      end,
      category,
    } => {
      let update = CalendarEventUpdate {
        title,
        description: patch(description),
        location: patch(location),
        start_date: start,
        end_date: end,
        category,
      };
      Ok(repo.update(&id, update).await?)
    }
    EventCommand::Delete { id } => Ok(repo.delete(&id).await?),
  }
}

fn notifications<G: Gateway + 'static>(
  portal: &Portal<G>,
  cmd: NotificationCommand,
) -> Result<()> {
  let center = portal.notifications();
  match cmd {
    NotificationCommand::List => print(&center.list()),
    NotificationCommand::Unread => {
      println!("{}", center.unread_count());
      Ok(())
    }
    NotificationCommand::Add { kind, title, message, link } => {
      print(&center.add(NewNotification { kind, title, message, link }))
    }
    NotificationCommand::Read { id } => {
      if !center.mark_as_read(id) {
        bail!("no notification {id}");
      }
      Ok(())
    }
    NotificationCommand::ReadAll => {
      center.mark_all_as_read();
      Ok(())
    }
  }
}

#[cfg(test)]
mod tests {
  use std::path::Path;

  use super::*;

  #[test]
  fn specs_split_on_the_first_equals() {
    let spec = parse_spec("Auto = Cobertura a todo riesgo; franquicia=300").unwrap();
    assert_eq!(spec.category, "Auto");
    assert_eq!(spec.content, "Cobertura a todo riesgo; franquicia=300");
    assert!(parse_spec("no separator").is_err());
  }

  #[test]
  fn spec_edits_carry_their_id() {
    let id = Uuid::new_v4();
    let change = parse_spec_edit(&format!("{id}=Hogar=Nuevo texto")).unwrap();
    assert_eq!(change, SpecificationChange::Edit {
      id,
      category: "Hogar".into(),
      content:  "Nuevo texto".into(),
    });
    assert!(parse_spec_edit("not-a-uuid=Hogar=x").is_err());
  }

  #[test]
  fn empty_values_clear_and_missing_values_keep() {
    assert_eq!(patch(None), Patch::Keep);
    assert_eq!(patch(Some(" ".into())), Patch::Clear);
    assert_eq!(patch(Some("x".into())), Patch::Set("x".to_owned()));
    assert_eq!(patch_tags(Some("a, b,,c".into())), Patch::Set(vec![
      "a".to_owned(),
      "b".to_owned(),
      "c".to_owned()
    ]));
    assert!(patch_id(Some("nope".into())).is_err());
  }

  #[test]
  fn views_parse_with_and_without_ids() {
    assert_eq!(parse_view("users").unwrap(), View::Users);
    let id = Uuid::new_v4();
    assert_eq!(
      parse_view(&format!("company_detail:{id}")).unwrap(),
      View::CompanyDetail(id)
    );
    assert!(parse_view("nowhere").is_err());
  }

  #[test]
  fn ids_must_be_canonical() {
    let id = Uuid::new_v4();
    assert_eq!(parse_id_arg(&id.to_string()), Ok(id));
    for raw in [
      id.simple().to_string(),
      id.braced().to_string(),
      id.urn().to_string(),
      id.to_string().to_uppercase(),
    ] {
      assert!(parse_id_arg(&raw).is_err(), "{raw} accepted");
      assert!(patch_id(Some(raw.clone())).is_err());
      assert!(parse_spec_edit(&format!("{raw}=Hogar=x")).is_err());
      assert!(parse_view(&format!("company_detail:{raw}")).is_err());
    }
  }

  #[test]
  fn content_types_follow_the_extension() {
    assert_eq!(content_type_for(Path::new("poliza.PDF")), "application/pdf");
    assert_eq!(content_type_for(Path::new("foto.jpeg")), "image/jpeg");
    assert_eq!(content_type_for(Path::new("sin_extension")), "application/octet-stream");
  }
}
