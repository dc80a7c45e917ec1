//! Shell commands, resource names and autocomplete logic

use crate::resource::ResourceName;

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  /// Listing the command switches to, for resource commands
  pub resource: Option<ResourceName>,
}

const fn view(
  name: &'static str,
  aliases: &'static [&'static str],
  description: &'static str,
  resource: ResourceName,
) -> Command {
  Command {
    name,
    aliases,
    description,
    resource: Some(resource),
  }
}

const fn action(
  name: &'static str,
  aliases: &'static [&'static str],
  description: &'static str,
) -> Command {
  Command {
    name,
    aliases,
    description,
    resource: None,
  }
}

/// All available commands
pub const COMMANDS: &[Command] = &[
  view("categories", &["c", "category", "cat"], "List categories", ResourceName::Category),
  view("articles", &["a", "article"], "List articles", ResourceName::Article),
  view("notes", &["note"], "List notes", ResourceName::Note),
  view("thoughts", &["t", "thought"], "List thoughts", ResourceName::Thought),
  view("comments", &["comment"], "Moderate comments", ResourceName::Comment),
  view(
    "guestbook",
    &["g", "independent", "independentcomment"],
    "Guestbook comments",
    ResourceName::IndependentComment,
  ),
  action("list", &["ls", "l"], "Show the current page"),
  action("next", &["n"], "Next page"),
  action("prev", &["p", "previous"], "Previous page"),
  action("page", &[], "Go to page: page <n>"),
  action("limit", &["size"], "Page size: limit <n>"),
  action("search", &["s", "/"], "Search: search <term> (empty clears)"),
  action("filter", &["f"], "Filter: filter <name> [value] (no value clears)"),
  action("sort", &["o", "order"], "Sort: sort <field> [asc|desc]"),
  action("create", &["new", "add"], "Create a record: create <json>"),
  action("update", &["edit"], "Update a record: update <id> <json>"),
  action("delete", &["d", "rm"], "Delete a record: delete <id>"),
  action("publish", &["show"], "Publish a record: publish <id>"),
  action("hide", &["unpublish"], "Hide a record: hide <id>"),
  action("stats", &["dashboard"], "Dashboard: stats [daily|monthly <start> <end>]"),
  action("refresh", &["r", "reload"], "Refetch the current page"),
  action("cache", &["entries"], "Show cached queries"),
  action("help", &["h", "?"], "Show commands"),
  action("quit", &["q", "exit"], "Exit quire"),
];

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  ranked(input).into_iter().map(|(cmd, _)| cmd).collect()
}

fn ranked(input: &str) -> Vec<(&'static Command, u32)> {
  let input_lower = input.to_lowercase();

  if input_lower.is_empty() {
    return COMMANDS.iter().map(|cmd| (cmd, 0)).collect();
  }

  let mut matches: Vec<(&'static Command, u32)> = Vec::new();

  for cmd in COMMANDS {
    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    // Fuzzy match on alias
    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) {
      matches.push((cmd, 5));
    }
  }

  // Sort by priority
  matches.sort_by_key(|(_, priority)| *priority);
  matches
}

/// Resolve typed input to a command. Only exact and prefix matches count,
/// so a typo is reported instead of running something unexpected.
pub fn resolve(input: &str) -> Option<&'static Command> {
  ranked(input)
    .into_iter()
    .find(|(_, priority)| *priority <= 3)
    .map(|(cmd, _)| cmd)
}

/// Resolve a resource name or alias ("articles", "a", "guestbook").
pub fn resolve_resource(input: &str) -> Option<ResourceName> {
  resolve(input).and_then(|cmd| cmd.resource)
}

/// `value_parser` for resource arguments.
pub fn parse_resource(input: &str) -> Result<ResourceName, String> {
  resolve_resource(input).ok_or_else(|| {
    let names: Vec<&str> = COMMANDS
      .iter()
      .filter(|cmd| cmd.resource.is_some())
      .map(|cmd| cmd.name)
      .collect();
    format!("unknown resource '{}' (expected one of: {})", input, names.join(", "))
  })
}
