//! Line-oriented rendition of the person-update form.

use std::io::Write;

use anyhow::{Result, bail};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use cadastro_core::{
    CadastroError, Candidate, Field, FormSchema, FormStore, SearchController, SearchMode,
    SearchPolicy, SearchSnapshot, log_submission,
};

/// What the user typed at the "pick a candidate" prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum Choice {
    Pick(usize),
    Search(String),
    Back,
}

pub fn parse_choice(input: &str, count: usize) -> Choice {
    let input = input.trim();
    if input.is_empty() {
        return Choice::Back;
    }
    match input.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Choice::Pick(n - 1),
        _ => Choice::Search(input.trim_start_matches('/').to_string()),
    }
}

/// Candidates as the list would render them. Under the eager mode the
/// service returns everyone, so the query filters locally.
pub fn visible_candidates(snapshot: &SearchSnapshot, mode: SearchMode) -> Vec<Candidate> {
    if mode != SearchMode::Eager || snapshot.query.is_empty() {
        return snapshot.candidates.clone();
    }
    let needle = snapshot.query.to_lowercase();
    snapshot
        .candidates
        .iter()
        .filter(|c| c.label.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

struct Prompter {
    lines: Lines<BufReader<Stdin>>,
}

impl Prompter {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    async fn ask(&mut self, prompt: &str) -> Result<String> {
        print!("{prompt}");
        std::io::stdout().flush()?;
        match self.lines.next_line().await? {
            Some(line) => Ok(line.trim_end().to_string()),
            None => bail!("input closed before the form was submitted"),
        }
    }
}

pub async fn run(search: &SearchController, json_output: bool) -> Result<()> {
    let mut prompter = Prompter::new();
    let schema = FormSchema::standard();
    let store = search.store().clone();
    let mode = search_mode(search);

    println!("Atualizar Cadastro de Pessoa");
    println!();

    pick_person(search, mode, &mut prompter).await?;
    ask_field(&mut prompter, &store, &schema, Field::Telefone, |s, v| s.set_telefone(v)).await?;
    ask_field(&mut prompter, &store, &schema, Field::Email, |s, v| s.set_email(v)).await?;

    match store.submit(&schema, log_submission) {
        Ok(submission) => {
            if json_output {
                println!("{}", serde_json::to_string_pretty(&submission)?);
            }
            println!("Verificar console.");
        }
        Err(CadastroError::Validation(errors)) => {
            for (field, message) in errors.iter() {
                eprintln!("{}: {message}", field.label());
            }
            std::process::exit(3);
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn search_mode(search: &SearchController) -> SearchMode {
    match search.policy() {
        SearchPolicy::EagerFetchOnce => SearchMode::Eager,
        SearchPolicy::OpenTriggered { .. } => SearchMode::Open,
        SearchPolicy::TextTriggered { .. } => SearchMode::Text,
    }
}

async fn pick_person(
    search: &SearchController,
    mode: SearchMode,
    prompter: &mut Prompter,
) -> Result<()> {
    search.on_open();
    let mut query = prompter.ask("Pessoa (nome, vazio para pular): ").await?;

    loop {
        if query.is_empty() {
            search.on_select(None);
            break;
        }

        search.on_text_change(query.clone());
        let snapshot = search.settled().await;
        let visible = visible_candidates(&snapshot, mode);

        if visible.is_empty() {
            println!("  Nenhuma pessoa encontrada.");
            query = prompter.ask("Pessoa (nome, vazio para pular): ").await?;
            continue;
        }

        for (i, candidate) in visible.iter().enumerate() {
            println!("  {:>2}. {}", i + 1, candidate.label);
        }

        let answer = prompter
            .ask(&format!("Escolha 1-{} (ou digite outra busca): ", visible.len()))
            .await?;
        match parse_choice(&answer, visible.len()) {
            Choice::Pick(i) => {
                search.on_select(Some(&visible[i]));
                println!("  Pessoa: {}", visible[i]);
                break;
            }
            Choice::Search(next) => query = next,
            Choice::Back => {
                query = prompter.ask("Pessoa (nome, vazio para pular): ").await?;
            }
        }
    }

    search.on_close();
    Ok(())
}

async fn ask_field<F>(
    prompter: &mut Prompter,
    store: &FormStore,
    schema: &FormSchema,
    field: Field,
    set: F,
) -> Result<()>
where
    F: Fn(&FormStore, String),
{
    loop {
        let value = prompter.ask(&format!("{}: ", field.label())).await?;
        set(store, value);
        match store.errors(schema).get(field) {
            Some(message) => println!("  {message}"),
            None => return Ok(()),
        }
    }
}
