//! Static referee instructions, one per phase, in Chinese, English and Japanese.

use serde::{Deserialize, Serialize};

use super::state::GamePhase;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Trilingual {
    pub zh: String,
    pub en: String,
    pub ja: String,
}

impl Trilingual {
    pub fn new(zh: impl Into<String>, en: impl Into<String>, ja: impl Into<String>) -> Self {
        Self {
            zh: zh.into(),
            en: en.into(),
            ja: ja.into(),
        }
    }
}

/// Instruction for `phase`, addressed to the active team when there is one.
pub fn phase_instruction(phase: GamePhase, active_team: Option<&str>) -> Trilingual {
    let name = match active_team {
        Some(name) if !name.is_empty() => name,
        _ => "Player",
    };

    match phase {
        GamePhase::Setup => Trilingual::new(
            "歡迎來到電壓戰爭！請輸入隊伍名稱以開始遊戲。",
            "Welcome to Voltage Wars! Please enter team names to start.",
            "Voltage Warsへようこそ！チーム名を入力して開始してください。",
        ),
        GamePhase::ADraw => Trilingual::new(
            format!("{name}，請點擊按鈕抽取您的 6 個半電池組件。"),
            format!("{name}, please click to draw your 6 half-cell components."),
            format!("{name}、ボタンをクリックして6つの半電池コンポーネントを引いてください。"),
        ),
        GamePhase::BDraw => Trilingual::new(
            format!("{name}，現在輪到你抽取組件了。"),
            format!("{name}, it is your turn to draw components."),
            format!("{name}、コンポーネントを引く番です。"),
        ),
        GamePhase::AAssemble => Trilingual::new(
            format!("{name}，請將組件拖入電池槽中以組裝兩個電池。"),
            format!("{name}, drag components into slots to assemble two cells."),
            format!("{name}、コンポーネントをスロットにドラッグして2つの電池を組み立ててください。"),
        ),
        GamePhase::BAssemble => Trilingual::new(
            format!("{name}，請進行電池組裝。選擇電位差最大的組合！"),
            format!("{name}, assemble your cells. Aim for the highest potential difference!"),
            format!("{name}、電池を組み立ててください。最大の電位差を目指しましょう！"),
        ),
        GamePhase::AWiring => Trilingual::new(
            format!("{name}，請連接電線。記得：紅線接高電位(正極)，黑線接低電位(負極)。"),
            format!("{name}, connect the wires. Remember: Red to High Potential (+), Black to Low (-)."),
            format!("{name}、配線を接続してください。赤は高電位（+）、黒は低電位（-）に接続します。"),
        ),
        GamePhase::BWiring => Trilingual::new(
            format!("{name}，請完成接線。串聯可以增加總電壓。"),
            format!("{name}, complete your wiring. Series connection increases total voltage."),
            format!("{name}、配線を完了してください。直列接続は総電圧を増加させます。"),
        ),
        GamePhase::JointDrawAnimation => Trilingual::new(
            "雙方請抽取 3 張功能卡。第一張強制攻擊，第二張強制強化，第三張自由選擇。",
            "Both teams draw 3 Action Cards. Card 1: Attack, Card 2: Buff, Card 3: Flexible.",
            "両チームがアクションカードを3枚引きます。1枚目は攻撃、2枚目は強化、3枚目は自由です。",
        ),
        GamePhase::BAction1 => Trilingual::new(
            format!("【第一張牌：強制攻擊】{name}，必須對對手使用此卡。"),
            format!("[Card 1: Mandatory Attack] {name}, you MUST use this card on the opponent."),
            format!("【1枚目：強制攻撃】{name}、このカードを対戦相手に使用しなければなりません。"),
        ),
        GamePhase::AAction1 => Trilingual::new(
            format!("【第一張牌：強制攻擊】{name}，你現在必須攻擊對手。"),
            format!("[Card 1: Mandatory Attack] {name}, you must now ATTACK the opponent."),
            format!("【1枚目：強制攻撃】{name}、対戦相手を攻撃しなければなりません。"),
        ),
        GamePhase::BAction2 | GamePhase::AAction2 => Trilingual::new(
            format!("【第二張牌：自我強化】{name}，必須對自己使用此卡。"),
            format!("[Card 2: Mandatory Buff] {name}, you MUST use this card on YOURSELF."),
            format!("【2枚目：自己強化】{name}、このカードを自分自身に使用しなければなりません。"),
        ),
        GamePhase::BAction3 => Trilingual::new(
            format!("【第三張牌：自由選擇】{name}，攻擊對手、強化自己或跳過。"),
            format!("[Card 3: Flexible] {name}, Target Opponent, Self, or Skip."),
            format!("【3枚目：自由選択】{name}、対戦相手を攻撃、自分を強化、またはスキップできます。"),
        ),
        GamePhase::AAction3 => Trilingual::new(
            format!("【第三張牌：自由選擇】{name}，這是最後的機會。攻擊、強化或跳過。"),
            format!("[Card 3: Flexible] {name}, final chance. Attack, Buff, or Skip."),
            format!("【3枚目：自由選択】{name}、最後のチャンスです。攻撃、強化、またはスキップしてください。"),
        ),
        GamePhase::RoundSummary => Trilingual::new(
            "本回合結束。請查看比分並準備下一回合。",
            "Round Over. Check scores and prepare for the next round.",
            "ラウンド終了。スコアを確認し、次のラウンドの準備をしてください。",
        ),
        GamePhase::GameOver => Trilingual::new(
            "比賽結束！三戰兩勝制的冠軍已經誕生！",
            "Game Over! The Best of 3 Champion has been crowned!",
            "ゲームオーバー！3戦2勝制のチャンピオンが決定しました！",
        ),
    }
}
