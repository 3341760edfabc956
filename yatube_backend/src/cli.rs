use crate::config::YatubeConfig;
use crate::database::Database;
use crate::files::FileService;
use crate::groups::GroupService;
use crate::posts::PostService;
use crate::users::UserService;
use anyhow::Result;
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Run the interactive admin console for users, groups and posts.
pub async fn run_cli(config: YatubeConfig, database: Database) -> Result<()> {
    let session = CliSession::new(&config, database);

    println!("Yatube admin console ready. Type 'help' for a list of commands.");

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);

    loop {
        print!("yatube> ");
        io::stdout().flush()?;

        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            println!("Exiting");
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let tokens = match shell_words::split(trimmed) {
            Ok(tokens) if !tokens.is_empty() => tokens,
            Ok(_) => continue,
            Err(err) => {
                println!("Unable to parse command: {err}");
                continue;
            }
        };

        match session.handle_command(&tokens) {
            Ok(LoopAction::Continue) => {}
            Ok(LoopAction::Exit) => break,
            Err(err) => {
                println!("Error: {err:#}");
            }
        }
    }

    Ok(())
}

struct CliSession {
    users: UserService,
    groups: GroupService,
    posts: PostService,
}

#[derive(Debug, PartialEq, Eq)]
enum LoopAction {
    Continue,
    Exit,
}

impl CliSession {
    fn new(config: &YatubeConfig, database: Database) -> Self {
        Self {
            users: UserService::new(database.clone(), config.auth.bcrypt_cost),
            groups: GroupService::new(database.clone()),
            posts: PostService::new(
                database,
                FileService::new(config.paths.clone()),
                config.listing.posts_per_page,
            ),
        }
    }

    fn handle_command(&self, tokens: &[String]) -> Result<LoopAction> {
        let command = tokens[0].as_str();
        match command {
            "help" => self.print_help(),
            "add-user" => {
                if tokens.len() < 3 {
                    println!("Usage: add-user <username> <password> [first_name] [last_name]");
                    return Ok(LoopAction::Continue);
                }
                let first_name = tokens.get(3).map(String::as_str).unwrap_or("");
                let last_name = tokens.get(4).map(String::as_str).unwrap_or("");
                let user = self
                    .users
                    .register(&tokens[1], &tokens[2], first_name, last_name)?;
                println!("Created user {} (id {})", user.username, user.id);
            }
            "list-users" | "users" => {
                let users = self.users.list_users()?;
                if users.is_empty() {
                    println!("No users yet. Use 'add-user' to create one.");
                }
                for user in users {
                    println!("  [{}] {} {} (joined {})", user.id, user.username, user.full_name, user.joined_at);
                }
            }
            "delete-user" => {
                let Some(username) = tokens.get(1) else {
                    println!("Usage: delete-user <username>");
                    return Ok(LoopAction::Continue);
                };
                self.users.delete_user(username)?;
                println!("Deleted user {username} with their posts and comments");
            }
            "add-group" => {
                if tokens.len() < 3 {
                    println!("Usage: add-group <slug> <title> [description]");
                    return Ok(LoopAction::Continue);
                }
                let description = tokens.get(3).map(String::as_str).unwrap_or("");
                let group = self.groups.create_group(&tokens[2], &tokens[1], description)?;
                println!("Created group {} ({})", group.slug, group.title);
            }
            "list-groups" | "groups" => {
                let groups = self.groups.list_groups()?;
                if groups.is_empty() {
                    println!("No groups yet. Use 'add-group' to create one.");
                }
                for group in groups {
                    println!("  [{}] {} - {}", group.id, group.slug, group.title);
                }
            }
            "delete-group" => {
                let Some(slug) = tokens.get(1) else {
                    println!("Usage: delete-group <slug>");
                    return Ok(LoopAction::Continue);
                };
                self.groups.delete_group(slug)?;
                println!("Deleted group {slug}; its posts are kept without a group");
            }
            "recent" => {
                let limit = tokens
                    .get(1)
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(10);
                let posts = self.posts.recent(limit)?;
                if posts.is_empty() {
                    println!("No posts yet.");
                }
                for post in posts {
                    let group = post
                        .group
                        .as_ref()
                        .map(|g| format!(" #{}", g.slug))
                        .unwrap_or_default();
                    println!("  [{}] {} @{}{}: {}", post.id, post.pub_date, post.author, group, preview(&post.text));
                }
            }
            "exit" | "quit" => return Ok(LoopAction::Exit),
            other => println!("Unknown command '{other}'. Type 'help' for a list of commands."),
        }
        Ok(LoopAction::Continue)
    }

    fn print_help(&self) {
        println!("Available commands:");
        println!("  help                                  Show this help message");
        println!("  add-user USER PASS [FIRST] [LAST]     Register a user");
        println!("  list-users                            List registered users");
        println!("  delete-user USER                      Delete a user and everything they wrote");
        println!("  add-group SLUG TITLE [DESCRIPTION]    Create a group");
        println!("  list-groups                           List groups");
        println!("  delete-group SLUG                     Delete a group, keeping its posts");
        println!("  recent [N]                            Show the newest posts (default 10)");
        println!("  exit                                  Quit the console");
    }
}

fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 60;
    let first_line = text.lines().next().unwrap_or("");
    if first_line.chars().count() > MAX_CHARS {
        let cut: String = first_line.chars().take(MAX_CHARS).collect();
        format!("{cut}...")
    } else {
        first_line.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::YatubePaths;

    fn session() -> CliSession {
        let mut config = YatubeConfig::new(0, YatubePaths::default());
        config.auth.bcrypt_cost = 4;
        CliSession::new(&config, Database::open_in_memory().expect("in-memory db"))
    }

    fn run(session: &CliSession, line: &str) -> Result<LoopAction> {
        let tokens = shell_words::split(line).expect("tokens");
        session.handle_command(&tokens)
    }

    #[test]
    fn console_manages_users_and_groups() {
        let session = session();
        assert_eq!(run(&session, "add-user leo 'long password' Leo Tolstoy").unwrap(), LoopAction::Continue);
        run(&session, "add-group business \"Business talk\" 'Offers and deals'").unwrap();

        assert_eq!(session.users.get_by_username("leo").unwrap().full_name, "Leo Tolstoy");
        assert_eq!(session.groups.get_by_slug("business").unwrap().title, "Business talk");

        run(&session, "delete-group business").unwrap();
        assert!(session.groups.list_groups().unwrap().is_empty());
        assert!(run(&session, "delete-user nobody").is_err());
        assert_eq!(run(&session, "exit").unwrap(), LoopAction::Exit);
    }

    #[test]
    fn long_posts_are_shortened_in_listings() {
        assert_eq!(preview("short\nsecond line"), "short");
        let long = "x".repeat(80);
        assert_eq!(preview(&long).chars().count(), 63);
    }
}
