use geneql::{GeneQL, GeneQLConfig, Principal, Row, UserLookup};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== GeneQL Access Demo ===\n");

    let (db, graph) = GeneQL::in_memory(&GeneQLConfig::new())?;
    graph.insert_rows(
        "User",
        [
            Row::new("u1").with("username", "alice").with("email", "alice@example.com"),
            Row::new("u2").with("username", "bob").with("email", "bob@example.com"),
        ],
    )?;
    graph.insert_row(
        "Resource",
        Row::new("roadmap").with("owner", "u1").with("type", "document"),
    )?;

    let ctx = db.context(Principal::new("User", "u1"));

    println!("1. Looking up bob by email");
    if let Some(bob) = db.get_user(&ctx, UserLookup::Email("bob@example.com".to_string()))? {
        println!("   found {} ({:?})", bob.id, bob.get("username"));
    }

    println!("\n2. Can bob read the roadmap?");
    println!("   {}", db.check_access(&ctx, "u2", "roadmap", "read")?);

    println!("\n3. alice shares it");
    let outcome = db.grant_access(&ctx, "u2", "roadmap", "read")?;
    println!("   {}", outcome.to_json());
    println!("   {}", db.check_access(&ctx, "u2", "roadmap", "read")?);

    println!("\n4. Queries");
    for query in [
        "GET User : username, email",
        "CHECK User(username = \"bob\") CAN read ON Resource.roadmap",
        "REVOKE read ON Resource.roadmap FROM User.u2",
        "CHECK User.u2 CAN read ON Resource.roadmap",
        "GET Resource.roadmap : name",
    ] {
        println!("   {}\n     -> {}", query, db.execute(query, &ctx));
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
