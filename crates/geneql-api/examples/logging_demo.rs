use geneql::logging::{LogConfig, LogFormat};
use geneql::{GeneQL, GeneQLConfig, Principal, Row};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Debug level shows every compile stage; mutations log at info
    let _guard = LogConfig::debug().with_format(LogFormat::Compact).init()?;

    println!("=== GeneQL Logging Demo ===\n");

    let (db, graph) = GeneQL::in_memory(&GeneQLConfig::new())?;
    graph.insert_row("User", Row::new("alice"))?;
    graph.insert_row("User", Row::new("bob"))?;
    graph.insert_row("Resource", Row::new("doc1").with("owner", "alice"))?;

    println!("\n1. Granting as the owner...");
    let alice = db.context(Principal::new("User", "alice"));
    db.compile_and_run("GRANT read ON Resource.doc1 TO User.bob", &alice)?;

    println!("\n2. Granting without admin (logged as a warning)...");
    let bob = db.context(Principal::new("User", "bob"));
    let result = db.execute("GRANT write ON Resource.doc1 TO User.bob", &bob);
    println!("{}", result);

    println!("\n3. Deleting the resource...");
    db.compile_and_run("DELETE Resource.doc1", &alice)?;

    println!("\n=== Demo Complete ===");
    Ok(())
}
