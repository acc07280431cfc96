use std::time::Duration;

use anyhow::anyhow;
use lsp_types::{GotoDefinitionResponse, Location, Position, Url};
use tokio::time::sleep;

use crate::cli::Config;
use crate::lsp::requests::MessageFactory;
use crate::lsp::types::{ResponseMessage, SendMessage};
use crate::lsp::Session;

const SAMPLE_DOCUMENT: &str = "local x = 1\n\nprint(x)\n";
// zero-based position of `x` inside print(x)
const DEFINITION_LINE: u32 = 2;
const DEFINITION_CHARACTER: u32 = 6;

pub async fn run(config: Config) -> anyhow::Result<()> {
    let (root, document) = workspace_urls()?;

    let mut session = Session::open(&config.server, &config.server_args)?
        .with_response_deadline(Duration::from_secs(config.timeout_secs));
    let mut factory = MessageFactory::new();

    let result = run_scenario(&mut session, &mut factory, &root, &document).await;

    if let Err(e) = session.close().await {
        eprintln!("Close Error: {:?}", e);
    }

    result
}

async fn run_scenario(
    session: &mut Session,
    factory: &mut MessageFactory,
    root: &Url,
    document: &Url,
) -> anyhow::Result<()> {
    let initialize = factory.initialize(root)?;
    let id = initialize.id.clone();
    session.send(&SendMessage::Request(initialize)).await?;
    let response = session.await_response_for(&id).await?;
    println!("Initialize response: {}", result_json(&response));

    session
        .send(&SendMessage::Notification(factory.initialized()?))
        .await?;

    let did_open = factory.did_open(document, "lua", SAMPLE_DOCUMENT)?;
    session.send(&SendMessage::Notification(did_open)).await?;

    // give the server a beat to analyze the document
    sleep(Duration::from_millis(100)).await;

    let definition = factory.definition(
        document,
        Position::new(DEFINITION_LINE, DEFINITION_CHARACTER),
    )?;
    let id = definition.id.clone();
    session.send(&SendMessage::Request(definition)).await?;
    let response = session.await_response_for(&id).await?;
    report_definition(&response)?;

    let shutdown = factory.shutdown()?;
    let id = shutdown.id.clone();
    session.send(&SendMessage::Request(shutdown)).await?;
    let response = session.await_response_for(&id).await?;
    match response.error {
        None => println!("Shutdown acknowledged"),
        Some(error) => eprintln!("Shutdown Error: {}", error),
    }

    Ok(())
}

fn report_definition(response: &ResponseMessage) -> anyhow::Result<()> {
    if let Some(error) = &response.error {
        eprintln!("Definition Error: {}", error);
        return Ok(());
    }

    let result = response.result.clone().unwrap_or(serde_json::Value::Null);
    if result.is_null() {
        println!("Definition: no location reported");
        return Ok(());
    }

    let definition: GotoDefinitionResponse = serde_json::from_value(result)?;
    match definition {
        GotoDefinitionResponse::Scalar(location) => print_location(&location),
        GotoDefinitionResponse::Array(locations) => {
            for location in &locations {
                print_location(location);
            }
        }
        GotoDefinitionResponse::Link(links) => {
            for link in &links {
                println!(
                    "Definition: {} {}:{}",
                    link.target_uri,
                    link.target_selection_range.start.line,
                    link.target_selection_range.start.character
                );
            }
        }
    }

    Ok(())
}

fn print_location(location: &Location) {
    println!(
        "Definition: {} {}:{}",
        location.uri, location.range.start.line, location.range.start.character
    );
}

fn result_json(response: &ResponseMessage) -> String {
    response
        .result
        .as_ref()
        .map(|value| value.to_string())
        .unwrap_or_else(|| "null".to_string())
}

fn workspace_urls() -> anyhow::Result<(Url, Url)> {
    let cwd = std::env::current_dir()?;
    let root = Url::from_file_path(&cwd)
        .map_err(|_| anyhow!("workspace path is not a valid file URL: {}", cwd.display()))?;
    let document = Url::from_file_path(cwd.join("def_jump.lua"))
        .map_err(|_| anyhow!("document path is not a valid file URL"))?;
    Ok((root, document))
}
