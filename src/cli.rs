//! CLI module
//!
//! Command-line interface for the task manager: serves the API, manages
//! tasks against a running server, and drives the interactive AI flows.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;

use crate::ai::{
    DayPlanRequest, HttpSuggestionService, ServiceConfig, SuggestScheduleRequest,
    SuggestTasksRequest, SuggestionService,
};
use crate::api::{serve, ApiClient, AppState, ClientConfig, ServerConfig};
use crate::flows::{BreakdownFlow, Phase, PlanDayFlow, ScheduleFlow, SuggestTasksFlow};
use crate::models::{Category, Priority, Store, StoreHandle, Task, TaskId, TaskPatch};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API server URL
    #[arg(short, long, default_value = "http://localhost:3000", env = "TASKWISE_SERVER")]
    server: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the taskwise API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 3000)]
        port: u16,

        /// Base URL of the AI suggestion backend
        #[arg(long, default_value = "http://localhost:4000", env = "TASKWISE_AI_URL")]
        ai_url: String,

        /// Seed the store with example tasks
        #[arg(long)]
        example: bool,
    },

    /// Task management commands
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// AI-assisted commands
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },

    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Add a new task
    Add {
        /// Task title
        title: String,

        /// Category: today, this-week or long-term
        #[arg(short, long, default_value = "today")]
        category: Category,
    },

    /// List tasks, optionally filtered by category
    List {
        /// Category: today, this-week or long-term
        #[arg(short, long)]
        category: Option<Category>,
    },

    /// Toggle a task's completion state
    Toggle {
        /// Task id
        id: String,
    },

    /// Toggle a subtask's completion state
    #[command(name = "toggle-subtask")]
    ToggleSubtask {
        /// Task id
        id: String,

        /// Subtask id
        subtask_id: String,
    },

    /// Edit a task's fields
    Edit {
        /// Task id
        id: String,

        /// New title
        #[arg(long)]
        title: Option<String>,

        /// New priority: high, medium or low
        #[arg(long)]
        priority: Option<Priority>,

        /// New category: today, this-week or long-term
        #[arg(long)]
        category: Option<Category>,

        /// New deadline (YYYY-MM-DD)
        #[arg(long)]
        deadline: Option<chrono::NaiveDate>,

        /// Remove the deadline
        #[arg(long, conflicts_with = "deadline")]
        clear_deadline: bool,

        /// Prioritization criteria for this task
        #[arg(long)]
        criteria: Option<String>,
    },

    /// Delete a task
    Delete {
        /// Task id
        id: String,
    },
}

#[derive(Subcommand)]
enum AiCommands {
    /// Suggest new tasks from your projects and habits
    Suggest {
        /// What you are currently working on
        projects: String,

        /// Recurring habits worth scheduling
        #[arg(default_value = "")]
        habits: String,
    },

    /// Break a task into subtasks, answering clarifying questions as needed
    Breakdown {
        /// Task id
        id: String,
    },

    /// Suggest a schedule and reminder for one task
    Schedule {
        /// Task id
        id: String,

        /// Your availability in free text
        #[arg(long, default_value = "Weekdays 9am to 5pm")]
        availability: String,
    },

    /// Score and reorder every task in a category
    Prioritize {
        /// Category: today, this-week or long-term
        #[arg(short, long, default_value = "today")]
        category: Category,
    },

    /// Generate a day plan and turn it into tasks
    #[command(name = "plan-day")]
    PlanDay {
        /// Main goal for the day
        goal: String,

        /// Wake-up time
        #[arg(long, default_value = "8:00 AM")]
        wake: String,

        /// Sleep time
        #[arg(long, default_value = "11:00 PM")]
        sleep: String,

        /// Fixed appointments in free text
        #[arg(long)]
        appointments: Option<String>,

        /// Water intake goal in liters
        #[arg(long, default_value_t = 2.0)]
        water: f64,
    },
}

/// Run the CLI application
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve {
            port,
            ai_url,
            example,
        } => {
            println!("Starting taskwise API server on port {}...", port);

            let store = if *example {
                println!("Seeding example tasks...");
                StoreHandle::new(Store::with_examples())
            } else {
                StoreHandle::new(Store::new())
            };

            let ai = HttpSuggestionService::with_config(ServiceConfig {
                base_url: ai_url.clone(),
            });
            let state = AppState {
                store,
                ai: Arc::new(ai),
            };
            let config = ServerConfig {
                address: ([127, 0, 0, 1], *port).into(),
            };

            serve(state, config).await?;
            Ok(())
        }

        Commands::Task { command } => {
            let client = create_client(&cli.server);
            run_task_command(&client, command).await
        }

        Commands::Ai { command } => {
            let client = create_client(&cli.server);
            run_ai_command(&client, command).await
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn create_client(server_url: &str) -> ApiClient {
    let config = ClientConfig {
        base_url: server_url.to_string(),
    };

    ApiClient::with_config(config)
}

async fn run_task_command(
    client: &ApiClient,
    command: &TaskCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        TaskCommands::Add { title, category } => {
            let task = client.create_task(title.clone(), *category).await?;
            println!("Added task {} in {}", task.id, task.category);
            Ok(())
        }

        TaskCommands::List { category } => {
            let tasks = client.list_tasks(*category).await?;
            if tasks.is_empty() {
                println!("No tasks. Add one with 'taskwise task add'");
            } else {
                for task in &tasks {
                    print_task(task);
                }
            }
            Ok(())
        }

        TaskCommands::Toggle { id } => {
            let id = TaskId::from_string(id.clone());
            match client.toggle_task(&id).await? {
                Some(task) => {
                    let state = if task.completed { "done" } else { "open" };
                    println!("Task {} is now {}", task.id, state);
                }
                None => println!("No task with id {}", id),
            }
            Ok(())
        }

        TaskCommands::ToggleSubtask { id, subtask_id } => {
            let id = TaskId::from_string(id.clone());
            match client.toggle_subtask(&id, subtask_id).await? {
                Some(task) => print_task(&task),
                None => println!("No task with id {}", id),
            }
            Ok(())
        }

        TaskCommands::Edit {
            id,
            title,
            priority,
            category,
            deadline,
            clear_deadline,
            criteria,
        } => {
            let id = TaskId::from_string(id.clone());
            let patch = TaskPatch {
                title: title.clone(),
                priority: *priority,
                category: *category,
                deadline: *deadline,
                clear_deadline: *clear_deadline,
                user_criteria: criteria.clone(),
                ..Default::default()
            };
            match client.update_task(&id, patch).await? {
                Some(task) => print_task(&task),
                None => println!("No task with id {}", id),
            }
            Ok(())
        }

        TaskCommands::Delete { id } => {
            let id = TaskId::from_string(id.clone());
            client.delete_task(&id).await?;
            println!("Deleted {}", id);
            Ok(())
        }
    }
}

async fn run_ai_command(
    client: &ApiClient,
    command: &AiCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    let svc: Arc<dyn SuggestionService> = Arc::new(client.clone());

    match command {
        AiCommands::Suggest { projects, habits } => {
            let mut flow = SuggestTasksFlow::new();
            flow.begin(
                svc,
                SuggestTasksRequest {
                    projects: projects.clone(),
                    past_habits: habits.clone(),
                },
            )?;
            println!("Asking for suggestions...");

            if flow.resolve().await != Phase::Ready {
                return Err(flow_failure(flow.error()));
            }
            let suggestions: Vec<String> = flow
                .suggestions()
                .unwrap_or_default()
                .to_vec();
            if suggestions.is_empty() {
                println!("No suggestions this time.");
                return Ok(());
            }

            println!("Suggested tasks:");
            for (i, title) in suggestions.iter().enumerate() {
                println!("  {}. {}", i + 1, title);
            }

            if confirm("Add these tasks?")? {
                let created = client.accept_suggestions(suggestions).await?;
                println!("Added {} tasks.", created.len());
            } else {
                println!("Discarded.");
            }
            Ok(())
        }

        AiCommands::Breakdown { id } => {
            let task = find_task(client, id).await?;
            let mut flow = BreakdownFlow::new(&task);
            flow.begin(svc.clone())?;
            println!("Breaking down \"{}\"...", task.title);

            // Clarification loop: answer questions until subtasks arrive
            loop {
                match flow.resolve().await {
                    Phase::AwaitingClarification => {
                        println!("The assistant needs more information:");
                        for question in flow.questions().unwrap_or_default() {
                            println!("  {}", question.cyan());
                        }
                        let answer = prompt("Your answer: ")?;
                        flow.respond(svc.clone(), answer)?;
                    }
                    Phase::Ready => break,
                    _ => return Err(flow_failure(flow.error())),
                }
            }

            let subtasks: Vec<String> = flow.subtasks().unwrap_or_default().to_vec();
            println!("Suggested subtasks:");
            for title in &subtasks {
                println!("  - {}", title);
            }

            if confirm("Add these subtasks?")? {
                if client.accept_breakdown(task.id.clone(), subtasks).await? {
                    println!("Subtasks added.");
                } else {
                    println!("Task no longer exists; nothing added.");
                }
            } else {
                println!("Discarded.");
            }
            Ok(())
        }

        AiCommands::Schedule { id, availability } => {
            let task = find_task(client, id).await?;
            let deadline = task
                .deadline
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "none".to_string());

            let mut flow = ScheduleFlow::new(task.id.clone());
            flow.begin(
                svc,
                SuggestScheduleRequest {
                    task_name: task.title.clone(),
                    deadline,
                    user_availability: availability.clone(),
                    priority: task.priority,
                },
            )?;
            println!("Finding a time for \"{}\"...", task.title);

            if flow.resolve().await != Phase::Ready {
                return Err(flow_failure(flow.error()));
            }
            let suggestion = match flow.suggestion() {
                Some(s) => s.clone(),
                None => return Err("no suggestion returned".into()),
            };

            println!("Suggested schedule: {}", suggestion.suggested_schedule);
            println!("Reminder: {}", suggestion.reminder_interval);
            println!("Reasoning: {}", suggestion.reasoning.dimmed());

            if confirm("Apply this schedule?")? {
                client
                    .accept_schedule(
                        task.id.clone(),
                        suggestion.suggested_schedule,
                        suggestion.reminder_interval,
                    )
                    .await?;
                println!("Schedule applied.");
            } else {
                println!("Discarded.");
            }
            Ok(())
        }

        AiCommands::Prioritize { category } => {
            println!("Prioritizing {}...", category);
            let merged = client.prioritize(*category).await?;
            if merged == 0 {
                println!("Nothing to prioritize in {}.", category);
            } else {
                println!("Reordered {} tasks:", merged);
                for task in client.list_tasks(Some(*category)).await? {
                    print_task(&task);
                }
            }
            Ok(())
        }

        AiCommands::PlanDay {
            goal,
            wake,
            sleep,
            appointments,
            water,
        } => {
            let mut flow = PlanDayFlow::new();
            flow.begin(
                svc,
                DayPlanRequest {
                    main_goal: goal.clone(),
                    wake_up_time: wake.clone(),
                    sleep_time: sleep.clone(),
                    fixed_appointments: appointments.clone(),
                    water_intake_liters: *water,
                },
            )?;
            println!("Planning your day...");

            if flow.resolve().await != Phase::Ready {
                return Err(flow_failure(flow.error()));
            }
            let schedule = flow.schedule().unwrap_or_default().to_vec();
            if schedule.is_empty() {
                println!("The assistant returned an empty plan.");
                return Ok(());
            }

            println!("Proposed day plan:");
            for item in &schedule {
                println!("  {}  {} ({})", item.time, item.task, item.priority);
            }

            if confirm("Add these to Today?")? {
                let created = client.accept_day_plan(schedule).await?;
                println!("Added {} tasks to Today.", created.len());
            } else {
                println!("Discarded.");
            }
            Ok(())
        }
    }
}

/// Fetches a task by id, failing with a readable message if absent
async fn find_task(client: &ApiClient, id: &str) -> Result<Task, Box<dyn std::error::Error>> {
    let tasks = client.list_tasks(None).await?;
    tasks
        .into_iter()
        .find(|t| t.id.as_str() == id)
        .ok_or_else(|| format!("no task with id {}", id).into())
}

fn flow_failure(error: Option<&crate::ai::AiError>) -> Box<dyn std::error::Error> {
    match error {
        Some(e) => format!("AI request failed: {}", e).into(),
        None => "AI request failed".into(),
    }
}

fn prompt(message: &str) -> io::Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn confirm(message: &str) -> io::Result<bool> {
    let answer = prompt(&format!("{} [y/N] ", message))?;
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

fn print_task(task: &Task) {
    let marker = if task.completed { "[x]" } else { "[ ]" };
    let priority = match task.priority {
        Priority::High => task.priority.to_string().red(),
        Priority::Medium => task.priority.to_string().yellow(),
        Priority::Low => task.priority.to_string().blue(),
    };
    let title = if task.completed {
        task.title.strikethrough().dimmed()
    } else {
        task.title.normal()
    };

    let mut line = format!("{} {}  {} ({}) [{}]", marker, task.id, title, priority, task.category);
    if let Some(deadline) = task.deadline {
        line.push_str(&format!(" due {}", deadline.format("%Y-%m-%d")));
    }
    if let Some(score) = task.priority_score {
        line.push_str(&format!(" score {:.0}", score));
    }
    println!("{}", line);

    if let Some(schedule) = &task.suggested_schedule {
        println!("      scheduled: {}", schedule.dimmed());
    }
    if let Some(reasoning) = &task.reasoning {
        println!("      {}", reasoning.dimmed());
    }
    for subtask in &task.subtasks {
        let marker = if subtask.completed { "[x]" } else { "[ ]" };
        println!("      {} {} ({})", marker, subtask.title, subtask.id);
    }
}
