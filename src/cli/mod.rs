use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::requests::{PcbSiding, ProjectDetails, RequestId, Stage};

pub mod commands;

#[derive(Parser)]
#[command(name = "shop-workflow")]
#[command(about = "Fabrication request workflow for the departmental shop")]
#[command(long_about = "Tracks 3D print, PCB mill and laser cut requests from submission to pickup. \
                       Staff move requests through UNFULFILLED, ASSIGNED, IN_PROGRESS and READY_FOR_PICKUP; \
                       adding a ready request to the cart finishes it.")]
pub struct Cli {
    /// Act as this user (staff id or customer e-mail)
    #[arg(long = "as", global = true, env = "SHOP_WORKFLOW_USER", value_name = "USER")]
    pub user: Option<String>,

    /// Directory holding the request and cart files
    #[arg(long, global = true, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Submit a new fabrication request
    Submit(SubmitArgs),
    /// List requests in one stage (or every stage), oldest first
    List {
        /// Stage tab to show, e.g. READY_FOR_PICKUP
        #[arg(long)]
        stage: Option<Stage>,
    },
    /// Show one request in full
    Show { id: RequestId },
    /// Count requests per stage
    Status,
    /// Assign an unfulfilled request to a technician
    Assign { id: RequestId, technician: String },
    /// Hand an assigned or in-progress request to another technician
    Reassign { id: RequestId, technician: String },
    /// Start work on an assigned request
    Start { id: RequestId },
    /// Mark an in-progress request ready for pickup
    Ready { id: RequestId },
    /// Add a ready request's fee to the cart and finish it
    AddToCart { id: RequestId },
    /// Apply the primary action for the request's current stage
    Advance {
        id: RequestId,
        /// Technician, needed when the request is still unfulfilled
        #[arg(long)]
        technician: Option<String>,
    },
    /// Cancel a request that is not finished yet
    Cancel {
        id: RequestId,
        #[arg(long, help = "Why the request was canceled")]
        reason: Option<String>,
    },
    /// Replace technician notes (omit the text to clear them)
    Notes { id: RequestId, text: Option<String> },
}

#[derive(Args)]
pub struct SubmitArgs {
    #[arg(long)]
    pub customer_name: String,

    #[arg(long)]
    pub customer_email: String,

    /// Name of the uploaded design file
    #[arg(long = "file", value_name = "FILE")]
    pub project_file_name: String,

    #[arg(long)]
    pub comments: Option<String>,

    #[command(subcommand)]
    pub project: ProjectArgs,
}

#[derive(Subcommand)]
pub enum ProjectArgs {
    /// 3D print job
    Print3d {
        #[arg(long, default_value_t = 1)]
        quantity: u32,
        #[arg(long = "color")]
        filament_color: String,
    },
    /// PCB milling job
    Pcb {
        #[arg(long, value_enum, default_value_t = SidingArg::Single)]
        siding: SidingArg,
        #[arg(long)]
        silkscreen: bool,
        #[arg(long)]
        rubout: bool,
        /// Board area in square inches
        #[arg(long = "area")]
        board_area_sq_in: f64,
    },
    /// Laser cutting job
    Laser {
        #[arg(long)]
        material: String,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SidingArg {
    Single,
    Double,
}

impl From<ProjectArgs> for ProjectDetails {
    fn from(args: ProjectArgs) -> Self {
        match args {
            ProjectArgs::Print3d {
                quantity,
                filament_color,
            } => ProjectDetails::Print3d {
                quantity,
                filament_color,
            },
            ProjectArgs::Pcb {
                siding,
                silkscreen,
                rubout,
                board_area_sq_in,
            } => ProjectDetails::Pcb {
                siding: match siding {
                    SidingArg::Single => PcbSiding::Single,
                    SidingArg::Double => PcbSiding::Double,
                },
                silkscreen,
                rubout,
                board_area_sq_in,
            },
            ProjectArgs::Laser { material, quantity } => ProjectDetails::Laser { material, quantity },
        }
    }
}
