use console::style;
use similar::{ChangeTag, TextDiff};

/// Print a line-level diff between the local and remote revisions of a file.
///
/// Returns `true` when the two revisions differ.
pub(crate) fn print_diff(label: &str, local: &str, remote: &str) -> bool {
    if local == remote {
        println!("{}", style(format!("{label}: no differences")).green());
        return false;
    }

    println!("{}", style(format!("--- local  {label}")).bold());
    println!("{}", style(format!("+++ remote {label}")).bold());

    let diff = TextDiff::from_lines(local, remote);

    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Delete => print!("{}", style(format!("-{change}")).red()),
            ChangeTag::Insert => print!("{}", style(format!("+{change}")).green()),
            ChangeTag::Equal => print!(" {change}"),
        }
    }

    true
}
